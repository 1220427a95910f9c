use url::Url;

/// The page the login flow runs in.
///
/// `assign` navigates away, adding a history entry. `replace` swaps the
/// current entry in place, so the old URL cannot be reached with "back".
pub trait Location {
    fn current_url(&self) -> Url;
    fn assign(&mut self, url: &Url);
    fn replace(&mut self, url: &Url);
}

/// A location held in memory, recording its history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryLocation {
    current: Url,
    back: Vec<Url>,
}

impl MemoryLocation {
    pub fn new(url: Url) -> Self {
        Self {
            current: url,
            back: Vec::new(),
        }
    }

    /// Every URL still reachable through history, oldest first.
    pub fn history(&self) -> Vec<Url> {
        self.back
            .iter()
            .chain(std::iter::once(&self.current))
            .cloned()
            .collect()
    }
}

impl Location for MemoryLocation {
    fn current_url(&self) -> Url {
        self.current.clone()
    }

    fn assign(&mut self, url: &Url) {
        let previous = std::mem::replace(&mut self.current, url.clone());
        self.back.push(previous);
    }

    fn replace(&mut self, url: &Url) {
        self.current = url.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_rewrites_history() {
        let start = Url::parse("http://127.0.0.1:4000/").unwrap();
        let mut location = MemoryLocation::new(start.clone());
        let landing = Url::parse("http://127.0.0.1:4000/?code=abc123").unwrap();
        location.assign(&landing);
        assert_eq!(location.current_url(), landing);

        location.replace(&start);
        assert_eq!(location.current_url(), start);
        assert_eq!(location.history(), vec![start.clone(), start]);
        assert!(
            location
                .history()
                .iter()
                .all(|u| !u.as_str().contains("code="))
        );
    }
}
