//! Small types shared between features.

/// How a tab came on screen
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OnAppearType {
    /// First appearance since launch
    #[default]
    FirstTime,
    /// The user switched back to the tab
    TabReappeared,
    /// Still on screen, nothing to refresh
    Retained,
}

/// Buttons of the "log in to continue" prompt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoginAlertAction {
    /// Dismiss the prompt
    CancelTapped,
    /// Go to the login screen
    LoginTapped,
}

/// Why a list is being fetched
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FetchType {
    /// First fetch of the screen
    #[default]
    Initial,
    /// The user picked another tab of the list
    TabChanged,
    /// Coming back from a pushed screen
    Resumed,
}
