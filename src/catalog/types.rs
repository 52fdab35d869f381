use serde::{Deserialize, Serialize};

/// Record kind as encoded in the catalog's `isTemplate` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MetadataType {
    #[default]
    #[serde(rename = "n")]
    Metadata,
    #[serde(rename = "y")]
    Template,
    #[serde(rename = "s")]
    SubTemplate,
    #[serde(rename = "t")]
    TemplateOfSubTemplate,
}

impl MetadataType {
    /// Wire value used by the catalog search index.
    pub fn wire_value(&self) -> &'static str {
        match self {
            MetadataType::Metadata => "n",
            MetadataType::Template => "y",
            MetadataType::SubTemplate => "s",
            MetadataType::TemplateOfSubTemplate => "t",
        }
    }

    /// Name expected by the record write endpoints (`metadataType` parameter).
    pub fn api_name(&self) -> &'static str {
        match self {
            MetadataType::Metadata => "METADATA",
            MetadataType::Template => "TEMPLATE",
            MetadataType::SubTemplate => "SUB_TEMPLATE",
            MetadataType::TemplateOfSubTemplate => "TEMPLATE_OF_SUB_TEMPLATE",
        }
    }

    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "n" => Some(MetadataType::Metadata),
            "y" => Some(MetadataType::Template),
            "s" => Some(MetadataType::SubTemplate),
            "t" => Some(MetadataType::TemplateOfSubTemplate),
            _ => None,
        }
    }

    /// Only plain records and templates can be transformed and written back.
    pub fn is_transformable(&self) -> bool {
        matches!(self, MetadataType::Metadata | MetadataType::Template)
    }
}

/// Editorial workflow status carried by catalogs with workflow enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Unknown,
    Draft,
    Approved,
    Retired,
    Submitted,
    Rejected,
}

impl WorkflowStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => WorkflowStatus::Draft,
            2 => WorkflowStatus::Approved,
            3 => WorkflowStatus::Retired,
            4 => WorkflowStatus::Submitted,
            5 => WorkflowStatus::Rejected,
            _ => WorkflowStatus::Unknown,
        }
    }

    /// Numeric code used by the status endpoints; `None` for a status this
    /// client does not know how to write back.
    pub fn code(&self) -> Option<i64> {
        match self {
            WorkflowStatus::Draft => Some(1),
            WorkflowStatus::Approved => Some(2),
            WorkflowStatus::Retired => Some(3),
            WorkflowStatus::Submitted => Some(4),
            WorkflowStatus::Rejected => Some(5),
            WorkflowStatus::Unknown => None,
        }
    }
}

/// Coarse workflow stage derived from the search index fields.
///
/// A record moves NEVER_APPROVED -> APPROVED, and an approved record being
/// edited gains a WORKING_COPY. Working copies cannot be updated through the
/// regular editor flow, so the pipeline skips them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    NeverApproved,
    Approved,
    WorkingCopy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub stage: WorkflowStage,
    /// Working copy status in the WORKING_COPY stage, record status otherwise.
    pub status: WorkflowStatus,
}

/// Identity and minimal metadata for one catalog record, as returned by search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRef {
    pub uuid: String,
    pub title: String,
    pub md_type: MetadataType,
    /// None when the catalog has workflow disabled.
    pub state: Option<WorkflowState>,
}

impl RecordRef {
    pub fn has_working_copy(&self) -> bool {
        matches!(
            self.state,
            Some(WorkflowState {
                stage: WorkflowStage::WorkingCopy,
                ..
            })
        )
    }
}

/// A catalog group, the ownership unit for newly created records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
}
