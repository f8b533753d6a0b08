use crate::domain::model::StoredRoadmap;
use crate::utils::error::{Result, RoadmapError};

const HEADER: [&str; 6] = [
    "sequence_index",
    "title",
    "difficulty",
    "estimated_hours",
    "description",
    "learning_objectives",
];

/// 將路線圖輸出為 CSV，學習目標以 " | " 串接
pub fn roadmap_to_csv(roadmap: &StoredRoadmap) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(HEADER)?;

    for record in &roadmap.modules {
        writer.write_record([
            record.sequence_index.to_string(),
            record.module.title.clone(),
            record.module.difficulty.to_string(),
            record.module.estimated_hours.to_string(),
            record.module.description.clone(),
            record.module.learning_objectives.join(" | "),
        ])?;
    }

    let bytes = writer.into_inner().map_err(|e| RoadmapError::IoError(e.into_error()))?;
    String::from_utf8(bytes)
        .map_err(|e| RoadmapError::IoError(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}
