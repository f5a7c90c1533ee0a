use bytes::Bytes;
use std::io::BufRead;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Blob,
    Tree,
    Commit,
}

impl ObjectType {
    pub fn as_str(&self) -> &str {
        match self {
            ObjectType::Blob => "blob",
            ObjectType::Tree => "tree",
            ObjectType::Commit => "commit",
        }
    }

    /// Prepend the `<type> <size>\0` header to an object body
    pub fn frame(&self, body: &[u8]) -> Bytes {
        let mut framed = format!("{} {}\0", self.as_str(), body.len()).into_bytes();
        framed.extend_from_slice(body);
        Bytes::from(framed)
    }

    /// Consume the header of a framed object, returning its type and declared size
    pub fn parse_header(data_reader: &mut impl BufRead) -> anyhow::Result<(ObjectType, usize)> {
        let mut object_type = Vec::new();
        data_reader.read_until(b' ', &mut object_type)?;
        if object_type.pop() != Some(b' ') {
            return Err(anyhow::anyhow!("Truncated object header"));
        }
        let object_type = ObjectType::try_from(std::str::from_utf8(&object_type)?)?;

        let mut size = Vec::new();
        data_reader.read_until(b'\0', &mut size)?;
        if size.pop() != Some(b'\0') {
            return Err(anyhow::anyhow!("Truncated object header"));
        }
        let size = std::str::from_utf8(&size)?.parse::<usize>()?;

        Ok((object_type, size))
    }
}

impl TryFrom<&str> for ObjectType {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> anyhow::Result<Self> {
        match value {
            "blob" => Ok(ObjectType::Blob),
            "tree" => Ok(ObjectType::Tree),
            "commit" => Ok(ObjectType::Commit),
            _ => Err(anyhow::anyhow!("Invalid object type: {value}")),
        }
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(ObjectType::Blob, b"hello".as_slice())]
    #[case(ObjectType::Tree, b"".as_slice())]
    #[case(ObjectType::Commit, b"tree x\n\nmsg".as_slice())]
    fn header_is_read_back(#[case] object_type: ObjectType, #[case] body: &[u8]) {
        let framed = object_type.frame(body);
        let mut reader = framed.as_ref();

        let (parsed_type, size) = ObjectType::parse_header(&mut reader).unwrap();
        assert_eq!(parsed_type, object_type);
        assert_eq!(size, body.len());
        assert_eq!(reader, body);
    }

    #[rstest]
    fn unknown_type_is_rejected() {
        let mut reader = b"tag 3\0abc".as_slice();
        assert!(ObjectType::parse_header(&mut reader).is_err());
    }
}
