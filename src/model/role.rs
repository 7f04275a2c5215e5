use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, EnumString, Display, AsRefStr, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Employee = 1,
    Supervisor = 2,
    Manager = 3,
    Owner = 4,
    Hr = 5,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Employee),
            2 => Some(Role::Supervisor),
            3 => Some(Role::Manager),
            4 => Some(Role::Owner),
            5 => Some(Role::Hr),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }
}

super::sql_text_enum!(Role);
