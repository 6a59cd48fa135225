/// One entry of the navigation menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavItem {
    pub label: &'static str,
    pub target: &'static str,
}

/// Static menu consumed by a single dispatcher.
#[derive(Debug, Clone, Copy)]
pub struct NavTable {
    items: &'static [NavItem],
}

impl NavTable {
    pub const fn new(items: &'static [NavItem]) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &'static [NavItem] {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn target(&self, index: usize) -> Option<&'static str> {
        self.items.get(index).map(|item| item.target)
    }

    /// Index of the entry whose target is `path` or a segment prefix of it.
    pub fn index_of(&self, path: &str) -> Option<usize> {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, item)| {
                path.strip_prefix(item.target)
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
            })
            .max_by_key(|(_, item)| item.target.len())
            .map(|(i, _)| i)
    }

    pub fn next(&self, index: usize) -> usize {
        if self.items.is_empty() {
            return 0;
        }
        (index + 1) % self.items.len()
    }

    pub fn prev(&self, index: usize) -> usize {
        if self.items.is_empty() {
            return 0;
        }
        if index == 0 {
            self.items.len() - 1
        } else {
            index - 1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ITEMS: &[NavItem] = &[
        NavItem { label: "Home", target: "/home" },
        NavItem { label: "Blog", target: "/blog" },
        NavItem { label: "Labs", target: "/labs" },
    ];
    const NAV: NavTable = NavTable::new(ITEMS);

    #[test]
    fn test_target() {
        assert_eq!(NAV.target(1), Some("/blog"));
        assert_eq!(NAV.target(9), None);
    }

    #[test]
    fn test_index_of() {
        assert_eq!(NAV.index_of("/blog"), Some(1));
        assert_eq!(NAV.index_of("/blog/post-1"), Some(1));
        assert_eq!(NAV.index_of("/blogger"), None);
        assert_eq!(NAV.index_of("/login"), None);
    }

    #[test]
    fn test_next_prev_wrap() {
        assert_eq!(NAV.next(0), 1);
        assert_eq!(NAV.next(2), 0);
        assert_eq!(NAV.prev(0), 2);
        assert_eq!(NAV.prev(1), 0);
    }
}
