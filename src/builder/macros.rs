//! Macros for ergonomic identifier declaration.

/// Generate an [`Identifier`](crate::core::Identifier) enum for state ids.
///
/// # Example
///
/// ```
/// use statecraft::core::Identifier;
/// use statecraft::state_enum;
///
/// state_enum! {
///     pub enum Light {
///         Red,
///         Green,
///         Yellow,
///     }
/// }
///
/// assert_eq!(Light::Yellow.name(), "Yellow");
/// ```
#[macro_export]
macro_rules! state_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, Debug, serde::Serialize, serde::Deserialize)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant
            ),*
        }

        impl $crate::core::Identifier for $name {
            fn name(&self) -> &str {
                match self {
                    $(Self::$variant => stringify!($variant)),*
                }
            }
        }
    };
}

/// Generate an [`Identifier`](crate::core::Identifier) enum for event types.
///
/// Expands exactly like [`state_enum!`]; the separate name keeps model
/// declarations readable.
///
/// ```
/// use statecraft::core::Identifier;
/// use statecraft::event_enum;
///
/// event_enum! {
///     enum Signal {
///         Tick,
///         Reset,
///     }
/// }
///
/// assert_eq!(Signal::Tick.name(), "Tick");
/// ```
#[macro_export]
macro_rules! event_enum {
    ($($body:tt)*) => {
        $crate::state_enum! { $($body)* }
    };
}

#[cfg(test)]
mod tests {
    use crate::core::Identifier;

    state_enum! {
        enum TestState {
            Initial,
            Processing,
            Complete,
        }
    }

    event_enum! {
        enum TestEvent {
            Begin,
            Finish,
        }
    }

    #[test]
    fn state_enum_macro_generates_trait() {
        assert_eq!(TestState::Initial.name(), "Initial");
        assert_eq!(TestState::Complete.name(), "Complete");
        assert_ne!(TestState::Processing, TestState::Complete);
    }

    #[test]
    fn event_enum_macro_generates_trait() {
        assert_eq!(TestEvent::Begin.name(), "Begin");
        assert_eq!(TestEvent::Finish.name(), "Finish");
    }

    #[test]
    fn state_enum_supports_visibility_and_attributes() {
        state_enum! {
            /// Documented enum
            pub enum PublicState {
                A,
                #[serde(rename = "bee")]
                B,
            }
        }

        assert_eq!(serde_json::to_string(&PublicState::B).unwrap(), "\"bee\"");
        assert_eq!(PublicState::A.name(), "A");
    }

    #[test]
    fn generated_enums_are_usable_as_map_keys() {
        let mut seen = std::collections::HashSet::new();
        assert!(seen.insert(TestState::Initial));
        assert!(!seen.insert(TestState::Initial));
    }
}
