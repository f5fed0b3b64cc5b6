use serde::{Deserialize, Serialize};
use std::fmt;

use crate::store::{decode_fields, encode_fields, DocPath, Document, DocumentSchema, SchemaError};

/// Public profile attributes stored on `users/<uid>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub occupation: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub social_links: Vec<String>,
    #[serde(rename = "photoURL", default)]
    pub photo_url: Option<String>,
}

impl DocumentSchema for UserProfile {
    const KIND: &'static str = "user profile";

    fn decode(path: &DocPath, data: &Document) -> Result<Self, SchemaError> {
        decode_fields(Self::KIND, path, data)
    }

    fn encode(&self) -> Document {
        encode_fields(self)
    }
}

impl fmt::Display for UserProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Name:       {}",
            self.display_name.as_deref().unwrap_or("(not set)")
        )?;
        writeln!(f, "Bio:        {}", self.bio)?;
        writeln!(f, "Occupation: {}", self.occupation)?;
        writeln!(f, "Location:   {}", self.location)?;
        if let Some(url) = &self.photo_url {
            writeln!(f, "Photo:      {}", url)?;
        }
        for link in &self.social_links {
            writeln!(f, "Link:       {}", link)?;
        }
        Ok(())
    }
}

/// Edits from the profile form. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub occupation: Option<String>,
    pub location: Option<String>,
    pub social_links: Option<Vec<String>>,
}

impl ProfileUpdate {
    /// Fields to merge into the profile document. Blank social links are dropped.
    pub fn fields(&self) -> Document {
        let mut fields = Document::new();
        if let Some(name) = &self.display_name {
            fields.insert("displayName".to_string(), name.trim().into());
        }
        if let Some(bio) = &self.bio {
            fields.insert("bio".to_string(), bio.trim().into());
        }
        if let Some(occupation) = &self.occupation {
            fields.insert("occupation".to_string(), occupation.trim().into());
        }
        if let Some(location) = &self.location {
            fields.insert("location".to_string(), location.trim().into());
        }
        if let Some(links) = &self.social_links {
            let links: Vec<serde_json::Value> = links
                .iter()
                .map(|l| l.trim())
                .filter(|l| !l.is_empty())
                .map(Into::into)
                .collect();
            fields.insert("socialLinks".to_string(), links.into());
        }
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }
}
