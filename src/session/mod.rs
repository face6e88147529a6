//! Browsing session ownership: the navigation contract, its chromiumoxide
//! implementation, and the health-checked lifecycle manager.

pub mod handle;
pub mod manager;

pub use handle::{BrowserSession, ElementRef, NavigationSession, find_browser_executable};
pub use manager::{SessionFactory, SessionManager, SessionState};
