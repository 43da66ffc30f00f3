use serde::{Deserialize, Deserializer, Serialize};

/// Text fields of a create request, collected from the multipart form.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct CreatePostDescriptor {
    pub title: String,
    pub description: String,
    /// Calendar date, blank for today.
    #[serde(default)]
    pub date: String,
    /// Encoded tag list, a JSON array or comma-separated values.
    #[serde(default)]
    pub tags: String,
    #[serde(rename = "externalLink", default)]
    pub external_link: Option<String>,
}

/// Partial metadata update.
///
/// Empty strings for `title`, `description` and `date` are ignored.
/// `external_link` distinguishes "not supplied" (`None`) from
/// "supplied" (`Some`), where a blank or `null` value clears the link.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct UpdatePostDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<TagsInput>,
    #[serde(
        rename = "externalLink",
        default,
        deserialize_with = "supplied",
        skip_serializing_if = "Option::is_none"
    )]
    pub external_link: Option<Option<String>>,
}

/// Tags as sent by a client: either a real list or its encoded string form.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum TagsInput {
    List(Vec<String>),
    Encoded(String),
}

/// Body of a successful delete.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DeleteResult {
    pub message: String,
}

/// Marks a field as supplied even when its value is `null`.
fn supplied<'de, D>(de: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(de).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_link_presence() {
        let absent: UpdatePostDescriptor = serde_json::from_str(r#"{"title":"x"}"#).unwrap();
        assert_eq!(absent.external_link, None);

        let null: UpdatePostDescriptor =
            serde_json::from_str(r#"{"externalLink":null}"#).unwrap();
        assert_eq!(null.external_link, Some(None));

        let empty: UpdatePostDescriptor = serde_json::from_str(r#"{"externalLink":""}"#).unwrap();
        assert_eq!(empty.external_link, Some(Some(String::new())));
    }

    #[test]
    fn tags_input_forms() {
        let list: UpdatePostDescriptor = serde_json::from_str(r#"{"tags":["a","b"]}"#).unwrap();
        assert_eq!(
            list.tags,
            Some(TagsInput::List(vec!["a".to_string(), "b".to_string()]))
        );

        let encoded: UpdatePostDescriptor =
            serde_json::from_str(r#"{"tags":"[\"a\",\"b\"]"}"#).unwrap();
        assert_eq!(
            encoded.tags,
            Some(TagsInput::Encoded(r#"["a","b"]"#.to_string()))
        );
    }
}
