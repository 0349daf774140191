//! X11 KeySym to USB HID Usage ID translation for the device's keyboard
//! channel.
//!
//! The device's key-event message carries USB HID Usage IDs (page 0x07,
//! Keyboard/Keypad page), while a VNC viewer delivers X11 KeySyms.  This
//! module holds the table that undoes the viewer's layout mapping.
//!
//! KeySyms identify *characters* where HID codes identify *key positions*:
//! the viewer reports the post-layout result (`XK_exclam` rather than
//! "Shift plus Digit1"), so shifted punctuation is folded back onto the
//! unshifted key that produces it on a US layout.  Any layout that could
//! have produced the observed KeySym is acceptable, since the device only
//! ever sees the combined key.
//!
//! The table is sorted by KeySym on first use and looked up by binary
//! search.  A miss returns [`NO_MAPPING`], which callers treat as "drop
//! the event".

use std::sync::OnceLock;

/// Returned by [`usage_for_keysym`] when a KeySym has no HID equivalent.
pub const NO_MAPPING: u8 = 0;

/// `(keysym, hid_usage)` pairs in no particular order; sorted on first use.
///
/// KeySym values are from X11/keysymdef.h.
static RAW_TABLE: &[(u32, u8)] = &[
    // Lowercase letters (HID 0x04-0x1D)
    (0x0061, 0x04), // XK_a
    (0x0062, 0x05), // XK_b
    (0x0063, 0x06), // XK_c
    (0x0064, 0x07), // XK_d
    (0x0065, 0x08), // XK_e
    (0x0066, 0x09), // XK_f
    (0x0067, 0x0A), // XK_g
    (0x0068, 0x0B), // XK_h
    (0x0069, 0x0C), // XK_i
    (0x006A, 0x0D), // XK_j
    (0x006B, 0x0E), // XK_k
    (0x006C, 0x0F), // XK_l
    (0x006D, 0x10), // XK_m
    (0x006E, 0x11), // XK_n
    (0x006F, 0x12), // XK_o
    (0x0070, 0x13), // XK_p
    (0x0071, 0x14), // XK_q
    (0x0072, 0x15), // XK_r
    (0x0073, 0x16), // XK_s
    (0x0074, 0x17), // XK_t
    (0x0075, 0x18), // XK_u
    (0x0076, 0x19), // XK_v
    (0x0077, 0x1A), // XK_w
    (0x0078, 0x1B), // XK_x
    (0x0079, 0x1C), // XK_y
    (0x007A, 0x1D), // XK_z
    // Uppercase letters map to the same positions
    (0x0041, 0x04), // XK_A
    (0x0042, 0x05), // XK_B
    (0x0043, 0x06), // XK_C
    (0x0044, 0x07), // XK_D
    (0x0045, 0x08), // XK_E
    (0x0046, 0x09), // XK_F
    (0x0047, 0x0A), // XK_G
    (0x0048, 0x0B), // XK_H
    (0x0049, 0x0C), // XK_I
    (0x004A, 0x0D), // XK_J
    (0x004B, 0x0E), // XK_K
    (0x004C, 0x0F), // XK_L
    (0x004D, 0x10), // XK_M
    (0x004E, 0x11), // XK_N
    (0x004F, 0x12), // XK_O
    (0x0050, 0x13), // XK_P
    (0x0051, 0x14), // XK_Q
    (0x0052, 0x15), // XK_R
    (0x0053, 0x16), // XK_S
    (0x0054, 0x17), // XK_T
    (0x0055, 0x18), // XK_U
    (0x0056, 0x19), // XK_V
    (0x0057, 0x1A), // XK_W
    (0x0058, 0x1B), // XK_X
    (0x0059, 0x1C), // XK_Y
    (0x005A, 0x1D), // XK_Z
    // Digits (HID 0x1E-0x27; note HID puts 0 after 9)
    (0x0031, 0x1E), // XK_1
    (0x0032, 0x1F), // XK_2
    (0x0033, 0x20), // XK_3
    (0x0034, 0x21), // XK_4
    (0x0035, 0x22), // XK_5
    (0x0036, 0x23), // XK_6
    (0x0037, 0x24), // XK_7
    (0x0038, 0x25), // XK_8
    (0x0039, 0x26), // XK_9
    (0x0030, 0x27), // XK_0
    // Control keys
    (0xFF0D, 0x28), // XK_Return
    (0xFF1B, 0x29), // XK_Escape
    (0xFF08, 0x2A), // XK_BackSpace
    (0xFF09, 0x2B), // XK_Tab
    (0x0020, 0x2C), // XK_space
    // Punctuation
    (0x002D, 0x2D), // XK_minus
    (0x003D, 0x2E), // XK_equal
    (0x005B, 0x2F), // XK_bracketleft
    (0x005D, 0x30), // XK_bracketright
    (0x005C, 0x31), // XK_backslash
    (0x003B, 0x33), // XK_semicolon
    (0x0027, 0x34), // XK_apostrophe
    (0x0060, 0x35), // XK_grave
    (0x002C, 0x36), // XK_comma
    (0x002E, 0x37), // XK_period
    (0x002F, 0x38), // XK_slash
    // Shifted forms folded back onto the US-layout key that produces them
    (0x003C, 0x36), // XK_less          -> comma
    (0x003E, 0x37), // XK_greater       -> period
    (0x0021, 0x1E), // XK_exclam        -> 1
    (0x0040, 0x1F), // XK_at            -> 2
    (0x0023, 0x20), // XK_numbersign    -> 3
    (0x0024, 0x21), // XK_dollar        -> 4
    (0x0025, 0x22), // XK_percent       -> 5
    (0x005E, 0x23), // XK_asciicircum   -> 6
    (0x0026, 0x24), // XK_ampersand     -> 7
    (0x002A, 0x25), // XK_asterisk      -> 8
    (0x0028, 0x26), // XK_parenleft     -> 9
    (0x0029, 0x27), // XK_parenright    -> 0
    (0x005F, 0x2D), // XK_underscore    -> minus
    (0x007C, 0x31), // XK_bar           -> backslash
    (0x0022, 0x34), // XK_quotedbl      -> apostrophe
    (0x007E, 0x35), // XK_asciitilde    -> grave
    (0x003F, 0x38), // XK_question      -> slash
    (0x003A, 0x33), // XK_colon         -> semicolon
    // Function keys
    (0xFFBE, 0x3A), // XK_F1
    (0xFFBF, 0x3B), // XK_F2
    (0xFFC0, 0x3C), // XK_F3
    (0xFFC1, 0x3D), // XK_F4
    (0xFFC2, 0x3E), // XK_F5
    (0xFFC3, 0x3F), // XK_F6
    (0xFFC4, 0x40), // XK_F7
    (0xFFC5, 0x41), // XK_F8
    (0xFFC6, 0x42), // XK_F9
    (0xFFC7, 0x43), // XK_F10
    (0xFFC8, 0x44), // XK_F11
    (0xFFC9, 0x45), // XK_F12
    (0xFFCA, 0x68), // XK_F13
    (0xFFCB, 0x69), // XK_F14
    (0xFFCC, 0x6A), // XK_F15
    (0xFFCD, 0x6B), // XK_F16
    (0xFFCE, 0x6C), // XK_F17
    (0xFFCF, 0x6D), // XK_F18
    (0xFFD0, 0x6E), // XK_F19
    (0xFFD1, 0x6F), // XK_F20
    (0xFFD2, 0x70), // XK_F21
    (0xFFD3, 0x71), // XK_F22
    (0xFFD4, 0x72), // XK_F23
    (0xFFD5, 0x73), // XK_F24
    // Navigation cluster
    (0xFF50, 0x4A), // XK_Home
    (0xFF51, 0x50), // XK_Left
    (0xFF52, 0x52), // XK_Up
    (0xFF53, 0x4F), // XK_Right
    (0xFF54, 0x51), // XK_Down
    (0xFF55, 0x4B), // XK_Prior (Page Up)
    (0xFF56, 0x4E), // XK_Next (Page Down)
    (0xFF57, 0x4D), // XK_End
    // Modifiers
    (0xFFE1, 0xE1), // XK_Shift_L
    (0xFFE2, 0xE5), // XK_Shift_R
    (0xFFE3, 0xE0), // XK_Control_L
    (0xFFE4, 0xE4), // XK_Control_R
    (0xFFE9, 0xE2), // XK_Alt_L
    (0xFFEA, 0xE6), // XK_Alt_R
];

static SORTED_TABLE: OnceLock<Vec<(u32, u8)>> = OnceLock::new();

fn table() -> &'static [(u32, u8)] {
    SORTED_TABLE.get_or_init(|| {
        let mut entries = RAW_TABLE.to_vec();
        entries.sort_unstable_by_key(|&(keysym, _)| keysym);
        entries
    })
}

/// Translates an X11 KeySym to the HID Usage ID the device expects.
///
/// Returns [`NO_MAPPING`] (zero) for any KeySym not in the table; callers
/// drop such events rather than sending a bogus usage code.
pub fn usage_for_keysym(keysym: u32) -> u8 {
    let entries = table();
    match entries.binary_search_by_key(&keysym, |&(k, _)| k) {
        Ok(index) => entries[index].1,
        Err(_) => NO_MAPPING,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
