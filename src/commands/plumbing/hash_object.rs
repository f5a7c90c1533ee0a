use crate::areas::repository::Repository;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;

impl Repository {
    /// ID `body` gets as an object of type `kind`, stored only when `write` is set
    ///
    /// The body is taken as already serialized; it is not validated against
    /// `kind`.
    pub fn hash_object(
        &self,
        kind: ObjectType,
        body: &[u8],
        write: bool,
    ) -> anyhow::Result<ObjectId> {
        if write {
            return self.database().put(kind, body);
        }

        Ok(ObjectId::from_content(&kind.frame(body)))
    }
}
