//! Category Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domain::value_objects::Slug;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: Slug,
    pub parent_id: Option<Uuid>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Admin-submitted category fields.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct CategoryInput {
    #[validate(length(min = 2, max = 100, message = "name must be between 2 and 100 characters"))]
    pub name: String,
    pub slug: Option<String>,
    /// Raw parent reference as submitted by the form; blank means none.
    pub parent: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[validate(length(max = 2048))]
    pub image: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0, max = 10000))]
    pub sort_order: i32,
}

/// How a submitted parent reference should be stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParentRef {
    None,
    Id(Uuid),
    Invalid,
}

impl CategoryInput {
    pub fn parent_ref(&self) -> ParentRef {
        match self.parent.as_deref().map(str::trim) {
            None | Some("") => ParentRef::None,
            Some(raw) => Uuid::parse_str(raw).map_or(ParentRef::Invalid, ParentRef::Id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(parent: Option<&str>) -> CategoryInput {
        CategoryInput {
            name: "Shirts".into(), slug: None, parent: parent.map(Into::into),
            description: None, image: None, sort_order: 0,
        }
    }

    #[test]
    fn test_blank_parent_means_none() {
        assert_eq!(input(None).parent_ref(), ParentRef::None);
        assert_eq!(input(Some("")).parent_ref(), ParentRef::None);
        assert_eq!(input(Some("   ")).parent_ref(), ParentRef::None);
    }

    #[test]
    fn test_parent_parsing() {
        let id = Uuid::new_v4();
        assert_eq!(input(Some(&id.to_string())).parent_ref(), ParentRef::Id(id));
        assert_eq!(input(Some("not-an-id")).parent_ref(), ParentRef::Invalid);
    }
}
