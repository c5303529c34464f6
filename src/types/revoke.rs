#[derive(Debug, Deserialize)]
pub struct RevokeCert {
    pub certificate: String,
    #[serde(default)]
    pub reason: Option<i16>,
}
