use crate::areas::repository::Repository;
use crate::artifacts::log::rev_list::{LogMode, RevList};
use crate::artifacts::objects::object_id::ObjectId;

impl Repository {
    /// History from `start`, or from the current tip when `start` is `None`
    ///
    /// An unborn branch has an empty history.
    pub fn log(&self, start: Option<&ObjectId>, mode: LogMode) -> anyhow::Result<RevList<'_>> {
        let start = match start {
            Some(oid) => Some(oid.clone()),
            None => self.refs().read_head()?,
        };

        Ok(RevList::new(self.database(), start, mode))
    }
}
