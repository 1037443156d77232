//! Sentence fragments
//!
//! A fragment with more than one non-whitespace character is looked up in
//! the `words` component, anything shorter in `chars`.

/// Which package component holds a fragment's audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FragmentKind {
    Chars,
    Words,
}

impl FragmentKind {
    pub fn classify(text: &str) -> Self {
        if text.chars().filter(|c| !c.is_whitespace()).count() > 1 {
            FragmentKind::Words
        } else {
            FragmentKind::Chars
        }
    }

    pub fn component(&self) -> &'static str {
        match self {
            FragmentKind::Chars => "chars",
            FragmentKind::Words => "words",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub text: String,
    pub kind: FragmentKind,
}

impl Fragment {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let kind = FragmentKind::classify(&text);
        Self { text, kind }
    }
}

/// A sentence and its fragments, in speaking order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    text: String,
    fragments: Vec<Fragment>,
}

impl Sentence {
    /// Fragments separated by whitespace
    pub fn from_text(text: &str) -> Self {
        Self {
            text: text.trim().to_string(),
            fragments: text.split_whitespace().map(Fragment::new).collect(),
        }
    }

    /// Fragments from an upstream segmenter; the sentence text is their
    /// concatenation
    pub fn from_fragments<I, T>(fragments: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let fragments: Vec<Fragment> = fragments
            .into_iter()
            .map(Into::into)
            .filter(|t: &String| !t.trim().is_empty())
            .map(Fragment::new)
            .collect();
        let text = fragments.iter().map(|f| f.text.as_str()).collect();

        Self { text, fragments }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn fragment_texts(&self) -> Vec<String> {
        self.fragments.iter().map(|f| f.text.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}
