use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PricingError {
    #[error("Unknown attribute group: {0}")]
    UnknownAttributeGroup(Uuid),

    #[error("Attribute value {value} does not belong to group {group}")]
    UnknownAttributeValue { group: Uuid, value: Uuid },

    #[error("A value must be selected for required attribute \"{0}\"")]
    MissingRequiredAttribute(String),
}
