use sea_orm::entity::prelude::*;

use crate::error::RedemptionError;
use crate::models::{Caveat, DelegationData};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "delegation_data")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub delegate: String,
    pub delegator: String,
    pub authority: String,
    #[sea_orm(column_type = "JsonBinary")]
    pub caveats: Json,
    pub salt: String,
    #[sea_orm(column_type = "Text")]
    pub signature: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub deleted_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for DelegationData {
    type Error = RedemptionError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let caveats: Vec<Caveat> = serde_json::from_value(model.caveats).map_err(|e| {
            RedemptionError::InvalidData(format!("delegation {} has malformed caveats: {e}", model.id))
        })?;

        Ok(Self {
            id: model.id,
            delegate: model.delegate,
            delegator: model.delegator,
            authority: model.authority,
            caveats,
            salt: model.salt,
            signature: model.signature,
        })
    }
}
