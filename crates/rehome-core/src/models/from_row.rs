#[cfg(any(feature = "postgres", feature = "sqlite"))]
use sqlx_core::from_row::FromRow;
#[cfg(any(feature = "postgres", feature = "sqlite"))]
use sqlx_core::row::Row;
#[cfg(any(feature = "postgres", feature = "sqlite"))]
use sqlx_core::types::Json;
#[cfg(feature = "postgres")]
use sqlx_postgres::PgRow;
#[cfg(feature = "sqlite")]
use sqlx_sqlite::SqliteRow;

#[cfg(any(feature = "postgres", feature = "sqlite"))]
use super::*;

#[cfg(any(feature = "postgres", feature = "sqlite"))]
fn parse_enum<T: TryFrom<i32, Error = EnumParseError>>(value: i32) -> Result<T, sqlx_core::Error> {
    T::try_from(value).map_err(|err| sqlx_core::Error::Decode(Box::new(err)))
}

macro_rules! impl_from_row {
    ($ty:ty, $row:ident => $body:block) => {
        #[cfg(feature = "sqlite")]
        impl FromRow<'_, SqliteRow> for $ty {
            fn from_row($row: &SqliteRow) -> Result<Self, sqlx_core::Error> {
                $body
            }
        }

        #[cfg(feature = "postgres")]
        impl FromRow<'_, PgRow> for $ty {
            fn from_row($row: &PgRow) -> Result<Self, sqlx_core::Error> {
                $body
            }
        }
    };
}

impl_from_row!(SourceUser, row => {
        let status: i32 = row.try_get("status")?;
        Ok(Self {
            id: row.try_get("id")?,
            namespace_id: row.try_get("namespace_id")?,
            placeholder_user_id: row.try_get("placeholder_user_id")?,
            reassign_to_user_id: row.try_get("reassign_to_user_id")?,
            reassigned_by_user_id: row.try_get("reassigned_by_user_id")?,
            source_hostname: row.try_get("source_hostname")?,
            status: parse_enum(status)?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
);

impl_from_row!(PlaceholderReference, row => {
        let composite_key: Option<Json<serde_json::Value>> = row.try_get("composite_key")?;
        Ok(Self {
            id: row.try_get("id")?,
            source_user_id: row.try_get("source_user_id")?,
            namespace_id: row.try_get("namespace_id")?,
            model: row.try_get("model")?,
            user_reference_column: row.try_get("user_reference_column")?,
            numeric_key: row.try_get("numeric_key")?,
            composite_key: composite_key.map(|value| value.0),
            alias_version: row.try_get("alias_version")?,
            created_at: row.try_get("created_at")?,
        })
    }
);

impl_from_row!(PlaceholderMembership, row => {
        let access_level: i32 = row.try_get("access_level")?;
        Ok(Self {
            id: row.try_get("id")?,
            source_user_id: row.try_get("source_user_id")?,
            namespace_id: row.try_get("namespace_id")?,
            group_id: row.try_get("group_id")?,
            project_id: row.try_get("project_id")?,
            access_level: parse_enum(access_level)?,
            expires_at: row.try_get("expires_at")?,
            created_at: row.try_get("created_at")?,
        })
    }
);

impl_from_row!(ExistingMembership, row => {
        let access_level: i32 = row.try_get("access_level")?;
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            source_type: row.try_get("source_type")?,
            source_id: row.try_get("source_id")?,
            access_level: parse_enum(access_level)?,
        })
    }
);

impl_from_row!(UserSummary, row => {
        Ok(Self {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            admin: row.try_get("admin")?,
        })
    }
);
