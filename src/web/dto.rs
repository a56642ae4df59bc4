use serde::{Deserialize, Serialize};

/// Optional page metadata sent with an upload. Missing fields are empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageFields {
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
}

impl PageFields {
    pub fn trimmed(self) -> Self {
        Self {
            slug: self.slug.trim().to_string(),
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            image: self.image.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeleteRequest {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResponse {
    pub ok: bool,
    pub file: String,
    pub url: String,
    pub build_ok: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub ok: bool,
    pub url: String,
    pub remaining: usize,
    pub build_ok: bool,
}
