/// A block of text within a page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Section {
    pub heading: Option<String>,
    pub lines: Vec<String>,
}

/// A key the shell binds while the page is shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageAction {
    pub key: char,
    pub label: String,
}

/// Presentational output of a component render.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Page {
    pub title: String,
    pub sections: Vec<Section>,
    pub actions: Vec<PageAction>,
}

impl Page {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn section<I, S>(mut self, heading: Option<&str>, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sections.push(Section {
            heading: heading.map(str::to_string),
            lines: lines.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn action(mut self, key: char, label: impl Into<String>) -> Self {
        self.actions.push(PageAction {
            key,
            label: label.into(),
        });
        self
    }

    pub fn has_action(&self, key: char) -> bool {
        self.actions.iter().any(|a| a.key == key)
    }

    /// Every line of the page in display order, headings included.
    pub fn text_lines(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().flat_map(|s| {
            s.heading
                .as_deref()
                .into_iter()
                .chain(s.lines.iter().map(String::as_str))
        })
    }
}
