use crate::areas::repository::Repository;
use crate::artifacts::objects::object::ObjectBox;
use crate::artifacts::objects::OBJECT_ID_LENGTH;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::RepositoryError;

impl Repository {
    /// Decoded object for a full or abbreviated ID
    pub fn cat_object(&self, id: &str) -> anyhow::Result<ObjectBox> {
        let oid = self.resolve_object_id(id)?;
        self.database().parse_object(&oid)
    }

    /// Expand an abbreviated ID to the single stored object it names
    pub fn resolve_object_id(&self, id: &str) -> anyhow::Result<ObjectId> {
        if id.len() == OBJECT_ID_LENGTH {
            let oid = ObjectId::try_parse(id.to_ascii_lowercase())?;
            if !self.database().exists(&oid) {
                return Err(RepositoryError::ObjectNotFound(oid).into());
            }
            return Ok(oid);
        }

        let mut matches = self.find_objects_by_prefix(id)?;
        match matches.len() {
            0 => anyhow::bail!("no object matches '{id}'"),
            1 => Ok(matches.remove(0)),
            n => anyhow::bail!("'{id}' is ambiguous, {n} objects match"),
        }
    }

    /// Stored object IDs starting with `prefix`, sorted
    pub fn find_objects_by_prefix(&self, prefix: &str) -> anyhow::Result<Vec<ObjectId>> {
        self.database().find_objects_by_prefix(prefix)
    }
}
