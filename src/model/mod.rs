/// Stores a `strum`-backed enum as its snake_case text in a VARCHAR column.
macro_rules! sql_text_enum {
    ($ty:ty) => {
        impl sqlx::Type<sqlx::MySql> for $ty {
            fn type_info() -> sqlx::mysql::MySqlTypeInfo {
                <str as sqlx::Type<sqlx::MySql>>::type_info()
            }

            fn compatible(ty: &sqlx::mysql::MySqlTypeInfo) -> bool {
                <str as sqlx::Type<sqlx::MySql>>::compatible(ty)
            }
        }

        impl<'q> sqlx::Encode<'q, sqlx::MySql> for $ty {
            fn encode_by_ref(&self, buf: &mut Vec<u8>) -> sqlx::encode::IsNull {
                <&str as sqlx::Encode<'q, sqlx::MySql>>::encode(self.as_ref(), buf)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::MySql> for $ty {
            fn decode(
                value: sqlx::mysql::MySqlValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let s = <&str as sqlx::Decode<sqlx::MySql>>::decode(value)?;
                Ok(s.parse::<$ty>()?)
            }
        }
    };
}

pub(crate) use sql_text_enum;

pub mod attendance;
pub mod decision;
pub mod leave;
pub mod permission;
pub mod profile_request;
pub mod project;
pub mod role;
pub mod timesheet;
pub mod user;
pub mod work_setting;
