// Defaults for engine settings and trigger fields

/// Idle time after the last chord keystroke before the prefix is discarded.
pub(crate) const CHORD_TIMEOUT_MS: u64 = 1000;
/// Rolling idle window for the snippet buffer.
pub(crate) const SNIPPET_TIMEOUT_MS: u64 = 1000;
/// Hold threshold for the built-in Escape/Tab modifier triggers.
pub(crate) const BUILTIN_HOLD_TIMEOUT_MS: u64 = 200;
/// Hold threshold for user modifier triggers that do not set one.
pub(crate) const MODIFIER_TIMEOUT_MS: u64 = 200;
/// Upper bound on buffered snippet characters.
pub(crate) const SNIPPET_BUFFER_CAP: usize = 256;

// Serde default functions
pub(crate) const fn default_true() -> bool {
    true
}
pub(crate) const fn default_chord_timeout_ms() -> u64 {
    CHORD_TIMEOUT_MS
}
pub(crate) const fn default_snippet_timeout_ms() -> u64 {
    SNIPPET_TIMEOUT_MS
}
pub(crate) const fn default_builtin_hold_timeout_ms() -> u64 {
    BUILTIN_HOLD_TIMEOUT_MS
}
pub(crate) const fn default_modifier_timeout_ms() -> u64 {
    MODIFIER_TIMEOUT_MS
}
pub(crate) const fn default_snippet_buffer_cap() -> usize {
    SNIPPET_BUFFER_CAP
}
