use crate::db::schema::t_recording_part;
use diesel::prelude::*;

#[derive(Insertable)]
#[diesel(table_name = t_recording_part)]
pub struct NewRecordingPartRow {
    pub session_id: String,
    pub file_name: String,
    pub mime_type: String,
    pub byte_size: i64,
    pub data: Vec<u8>,
    pub created_at_ms: i64,
}
