//! Speaking-style catalogue, voice list, and prefix composition.
//!
//! Styles are a fixed, ordered catalogue defined at compile time. The outbound
//! prefix always concatenates control tokens in catalogue order so the same
//! selection produces the same text no matter which order the user toggled in.

use std::collections::BTreeMap;

/// One entry in the fixed style catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyleDef {
    pub name: &'static str,
    pub hotkey: char,
    pub token: &'static str,
}

/// Ordered style catalogue. Extending the app with a new style means adding a
/// row here; persisted configs pick it up through the merge in `config`.
pub const DEFAULT_STYLES: &[StyleDef] = &[
    StyleDef { name: "Teaching", hotkey: 't', token: "<<style:teaching, clear, friendly>>" },
    StyleDef { name: "Calm", hotkey: 'c', token: "<<style:calm, gentle>>" },
    StyleDef { name: "Excited", hotkey: 'e', token: "<<style:excited, energetic>>" },
    StyleDef { name: "Narration", hotkey: 'n', token: "<<style:narration, warm, paced>>" },
    StyleDef { name: "Questioning", hotkey: 'q', token: "<<style:questioning, curious, rising>>" },
    StyleDef { name: "Warm", hotkey: 'w', token: "<<style:warm, soft>>" },
    StyleDef { name: "Formal", hotkey: 'f', token: "<<style:formal, precise>>" },
    StyleDef { name: "Angry", hotkey: 'a', token: "<<style:angry, terse, forceful>>" },
    StyleDef { name: "Sarcastic", hotkey: 's', token: "<<style:sarcastic, wry, ironic>>" },
    StyleDef { name: "Serious", hotkey: 'r', token: "<<style:serious, measured>>" },
    StyleDef { name: "Playful", hotkey: 'p', token: "<<style:playful, light, whimsical>>" },
    StyleDef { name: "Whisper", hotkey: 'h', token: "<<style:whisper, soft, intimate>>" },
    StyleDef { name: "Confident", hotkey: 'o', token: "<<style:confident, assertive>>" },
    StyleDef { name: "Melancholic", hotkey: 'm', token: "<<style:melancholic, slow, soft>>" },
    StyleDef { name: "Dramatic", hotkey: 'd', token: "<<style:dramatic, emphatic>>" },
    StyleDef { name: "Cheerful", hotkey: 'l', token: "<<style:cheerful, bright>>" },
];

/// Selectable voice identifiers, in cycle order.
pub const VOICES: &[&str] = &[
    "alloy", "ash", "ballad", "coral", "echo", "fable", "nova", "onyx", "sage", "shimmer",
];

/// Hotkeys the UI must not bind because the terminal or the app already uses
/// them (Ctrl+H is backspace on many terminals, Ctrl+M is Enter, the rest are
/// app-level shortcuts).
pub const RESERVED_HOTKEYS: &[char] = &['q', 'v', 's', 'h', 'm'];

/// Enabled/disabled flags for every catalogue style, in catalogue order.
#[derive(Debug, Clone)]
pub struct StyleSelection {
    enabled: Vec<bool>,
}

impl Default for StyleSelection {
    fn default() -> Self {
        Self { enabled: vec![false; DEFAULT_STYLES.len()] }
    }
}

impl StyleSelection {
    /// Seed from a persisted name -> enabled map. Names that are not in the
    /// catalogue are ignored; missing names stay disabled.
    pub fn from_config(saved: &BTreeMap<String, bool>) -> Self {
        let enabled = DEFAULT_STYLES
            .iter()
            .map(|def| saved.get(def.name).copied().unwrap_or(false))
            .collect();
        Self { enabled }
    }

    pub fn is_active(&self, name: &str) -> bool {
        position(name).map(|idx| self.enabled[idx]).unwrap_or(false)
    }

    /// Flip a style and return its new state. Unknown names are a programming
    /// error upstream; in release builds they are ignored.
    pub fn toggle(&mut self, name: &str) -> bool {
        debug_assert!(position(name).is_some(), "unknown style {name:?}");
        match position(name) {
            Some(idx) => {
                self.enabled[idx] = !self.enabled[idx];
                self.enabled[idx]
            }
            None => false,
        }
    }

    /// Concatenated control tokens of the active styles, in catalogue order.
    pub fn build_prefix(&self) -> String {
        DEFAULT_STYLES
            .iter()
            .zip(&self.enabled)
            .filter(|(_, active)| **active)
            .map(|(def, _)| def.token)
            .collect()
    }

    /// (definition, active) pairs for rendering, in catalogue order.
    pub fn display_items(&self) -> Vec<(StyleDef, bool)> {
        DEFAULT_STYLES.iter().copied().zip(self.enabled.iter().copied()).collect()
    }

    /// Name -> enabled map in the shape the persisted config stores.
    pub fn to_config(&self) -> BTreeMap<String, bool> {
        DEFAULT_STYLES
            .iter()
            .zip(&self.enabled)
            .map(|(def, active)| (def.name.to_string(), *active))
            .collect()
    }
}

fn position(name: &str) -> Option<usize> {
    DEFAULT_STYLES.iter().position(|def| def.name == name)
}

/// Lowercase hotkey -> style name for the UI's Ctrl+<key> bindings, skipping
/// reserved keys.
pub fn hotkey_lookup() -> Vec<(char, &'static str)> {
    DEFAULT_STYLES
        .iter()
        .filter(|def| !RESERVED_HOTKEYS.contains(&def.hotkey))
        .map(|def| (def.hotkey, def.name))
        .collect()
}
