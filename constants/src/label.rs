/// Label map values used by the segmentation inputs
pub const BACKGROUND_LABEL: u8 = 0;

/// Dentition tissue eligible for displacement and promotion
pub const TOOTH_LABEL: u8 = 1;

/// Dark/fracture region sampled for boundary noise statistics
pub const DARK_LABEL: u8 = 2;

pub struct LabelInfo {
    pub id: u8,
    pub name: &'static str,
}

pub const LABEL_MAP: &[LabelInfo] = &[
    LabelInfo {
        id: BACKGROUND_LABEL,
        name: "background",
    },
    LabelInfo {
        id: TOOTH_LABEL,
        name: "tooth",
    },
    LabelInfo {
        id: DARK_LABEL,
        name: "dark/fracture",
    },
];

pub fn get_label_name(id: u8) -> String {
    LABEL_MAP
        .iter()
        .find(|l| l.id == id)
        .map_or("unknown", |l| l.name)
        .to_string()
}
