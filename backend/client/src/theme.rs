use std::fmt;

use crate::store::LocalStore;

pub const THEME_KEY: &str = "feedbackwall.theme";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    /// Anything other than a stored `dark` reads as light.
    pub fn load(store: &impl LocalStore) -> Self {
        match store.get(THEME_KEY).as_deref() {
            Some("dark") => Theme::Dark,
            _ => Theme::Light,
        }
    }

    pub fn save(self, store: &mut impl LocalStore) {
        store.set(THEME_KEY, self.as_str());
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_default_light() {
        assert_eq!(Theme::load(&MemoryStore::new()), Theme::Light);
    }

    #[test]
    fn test_saved_theme() {
        let mut store = MemoryStore::new();
        Theme::Dark.save(&mut store);
        assert_eq!(Theme::load(&store), Theme::Dark);

        store.set(THEME_KEY, "sepia");
        assert_eq!(Theme::load(&store), Theme::Light);
    }
}
