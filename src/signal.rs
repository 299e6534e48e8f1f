//! Inbound trigger signals and their confidence.

use serde::{Deserialize, Serialize};

/// How strongly a trigger implies the buffer changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// Indirect UI hint; debounced.
    Low,
    /// Verified platform notification; detected immediately.
    High,
}

/// Platform signals a host forwards to the observer.
///
/// The ambient kinds are the accessibility-style UI events that tend to
/// accompany a copy: focus moves, selections, clicks, scrolls. None of them
/// proves the buffer changed, so all map to `Low`. Only the native
/// clipboard-changed notification maps to `High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiSignal {
    /// Content inside a window changed.
    WindowContentChanged,
    /// A text selection moved or changed.
    TextSelectionChanged,
    /// Editable text changed.
    TextChanged,
    /// A view was clicked.
    ViewClicked,
    /// A window opened, closed or changed state.
    WindowStateChanged,
    /// A view gained focus.
    ViewFocused,
    /// A touch interaction ended.
    TouchInteractionEnd,
    /// A gesture ended.
    GestureEnd,
    /// A view scrolled.
    ViewScrolled,
    /// The platform's own "primary clip changed" callback.
    NativeClipChanged,
}

impl UiSignal {
    /// Every signal kind, in declaration order.
    pub const ALL: [Self; 10] = [
        Self::WindowContentChanged,
        Self::TextSelectionChanged,
        Self::TextChanged,
        Self::ViewClicked,
        Self::WindowStateChanged,
        Self::ViewFocused,
        Self::TouchInteractionEnd,
        Self::GestureEnd,
        Self::ViewScrolled,
        Self::NativeClipChanged,
    ];

    /// Confidence carried by this signal.
    #[must_use]
    pub const fn confidence(self) -> Confidence {
        match self {
            Self::NativeClipChanged => Confidence::High,
            _ => Confidence::Low,
        }
    }
}

impl From<UiSignal> for Confidence {
    fn from(signal: UiSignal) -> Self {
        signal.confidence()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_native_signal_is_high() {
        let high: Vec<_> = UiSignal::ALL
            .iter()
            .filter(|s| s.confidence() == Confidence::High)
            .collect();
        assert_eq!(high, vec![&UiSignal::NativeClipChanged]);
    }

    #[test]
    fn test_signal_names() {
        let json = serde_json::to_string(&UiSignal::TextSelectionChanged).unwrap();
        assert_eq!(json, "\"text_selection_changed\"");
        let parsed: UiSignal = serde_json::from_str("\"view_scrolled\"").unwrap();
        assert_eq!(Confidence::from(parsed), Confidence::Low);
    }
}
