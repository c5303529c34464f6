#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    #[serde(rename = "type")]
    pub id_type: String,
    pub value: String,
}

#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum Type {
    DNS,
    IP,
}

impl Type {
    pub fn from_str(id_type: &str) -> Option<Self> {
        match id_type {
            "dns" => Some(Self::DNS),
            "ip" => Some(Self::IP),
            _ => None
        }
    }

    pub fn to_string(&self) -> String {
        match self {
            Self::DNS => "dns".to_string(),
            Self::IP => "ip".to_string(),
        }
    }
}
