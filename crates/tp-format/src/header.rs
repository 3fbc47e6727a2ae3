//! File-level header bindings.

use crate::dictionary::KeyDictionary;
use crate::tagged_map::TaggedMap;
use serde::Serialize;
use tp_common::schema::{
    HEADER_AWS_INSTANCE, HEADER_AWS_REGION, HEADER_TESTRUN_ID, HEADER_TESTRUN_ROLE,
};
use tp_common::DimensionError;

/// Identity of the process that wrote a telemetry file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileHeader {
    pub testrun_id: String,
    pub testrun_role: String,
    pub aws_instance: String,
    pub aws_region: String,
}

impl FileHeader {
    /// Lift the four required text bindings out of the header map.
    pub fn from_map(map: &TaggedMap, dict: &KeyDictionary) -> Result<Self, DimensionError> {
        Ok(Self {
            testrun_id: required_text(map, dict, HEADER_TESTRUN_ID)?,
            testrun_role: required_text(map, dict, HEADER_TESTRUN_ROLE)?,
            aws_instance: required_text(map, dict, HEADER_AWS_INSTANCE)?,
            aws_region: required_text(map, dict, HEADER_AWS_REGION)?,
        })
    }
}

fn required_text(
    map: &TaggedMap,
    dict: &KeyDictionary,
    name: &str,
) -> Result<String, DimensionError> {
    let value = dict
        .tag_of(name)
        .and_then(|tag| map.get(tag))
        .ok_or_else(|| DimensionError::MissingBinding {
            name: name.to_string(),
        })?;
    value
        .as_text()
        .map(str::to_string)
        .ok_or_else(|| DimensionError::BindingType {
            name: name.to_string(),
            found: value.kind().to_string(),
        })
}
