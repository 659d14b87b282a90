//! Represents an image record: album metadata plus the key of its payload.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Content type every payload is stored with, whatever the upload contained.
pub const IMAGE_CONTENT_TYPE: &str = "image/png";

/// A single album entry as persisted in the metadata store.
///
/// The binary payload lives out-of-line in the object store under
/// `object_key`; this struct only carries the metadata.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    /// Opaque identifier generated when the record is created.
    pub id: String,

    /// User-supplied label. Free text, possibly empty.
    pub name: String,

    /// Date of creation or of the last payload replacement.
    pub date: NaiveDate,

    /// Key of the payload in the object store.
    pub object_key: String,
}

/// An image record as returned by the listing endpoint, with a signed URL
/// in place of direct object access.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageView {
    pub id: String,
    pub name: String,
    pub date: NaiveDate,
    pub object_key: String,
    pub url: String,
}

impl ImageView {
    pub fn new(record: ImageRecord, url: String) -> Self {
        Self {
            id: record.id,
            name: record.name,
            date: record.date,
            object_key: record.object_key,
            url,
        }
    }
}

/// An uploaded file taken off a multipart form.
#[derive(Clone, Debug)]
pub struct ImageUpload {
    /// Client-side filename, used only to pick the key extension.
    pub file_name: Option<String>,
    pub data: bytes::Bytes,
}

/// Derive the object key for a new record: the identifier, suffixed with the
/// upload's extension when it has a sane one.
pub fn object_key_for(id: &str, file_name: Option<&str>) -> String {
    match file_name.and_then(extension_of) {
        Some(ext) => format!("{}.{}", id, ext),
        None => id.to_string(),
    }
}

fn extension_of(file_name: &str) -> Option<String> {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let (stem, ext) = base.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || ext.len() > 10 {
        return None;
    }
    if !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_keeps_upload_extension() {
        assert_eq!(object_key_for("abc", Some("holiday.JPG")), "abc.jpg");
        assert_eq!(object_key_for("abc", Some("dir/sub/pic.tar.png")), "abc.png");
        assert_eq!(object_key_for("abc", Some("C:\\Users\\me\\pic.gif")), "abc.gif");
    }

    #[test]
    fn key_falls_back_to_identifier() {
        assert_eq!(object_key_for("abc", None), "abc");
        assert_eq!(object_key_for("abc", Some("noext")), "abc");
        assert_eq!(object_key_for("abc", Some(".hidden")), "abc");
        assert_eq!(object_key_for("abc", Some("trailing.")), "abc");
        assert_eq!(object_key_for("abc", Some("weird.p/g")), "abc");
        assert_eq!(object_key_for("abc", Some("bad.ex t")), "abc");
    }

    #[test]
    fn listed_record_serializes_camel_case() {
        let record = ImageRecord {
            id: "abc".into(),
            name: "Beach".into(),
            date: NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
            object_key: "abc.png".into(),
        };
        let view = ImageView::new(record, "http://x/objects/abc.png?sig".into());
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "abc",
                "name": "Beach",
                "date": "2024-03-09",
                "objectKey": "abc.png",
                "url": "http://x/objects/abc.png?sig"
            })
        );
    }
}
