//! Chunk type codes.
//!
//! The high bit marks a versioned chunk: its body starts with a
//! `(major: i32, minor: i32)` pair that the length prefix covers.

use crate::model::ComponentType;

/// Flag bit for chunks whose body starts with a version pair.
pub const TCODE_VERSIONED: u32 = 0x8000_0000;

pub const TCODE_START_SECTION: u32 = TCODE_VERSIONED | 0x0001;
pub const TCODE_PROPERTIES: u32 = TCODE_VERSIONED | 0x0010;
pub const TCODE_SETTINGS: u32 = TCODE_VERSIONED | 0x0011;
pub const TCODE_USER_STRINGS: u32 = TCODE_VERSIONED | 0x0012;

/// Component tables: `TCODE_TABLE_BASE + component type`.
pub const TCODE_TABLE_BASE: u32 = TCODE_VERSIONED | 0x0100;

pub const TCODE_COMPONENT_RECORD: u32 = TCODE_VERSIONED | 0x0200;
pub const TCODE_COMPONENT_PAYLOAD: u32 = TCODE_VERSIONED | 0x0201;

pub const TCODE_END_OF_FILE: u32 = 0x7FFF_FFFF;

/// Returns true if chunks with this code carry a version pair.
#[inline]
pub fn is_versioned(type_code: u32) -> bool {
    type_code & TCODE_VERSIONED != 0
}

/// Returns the table type code for a component type.
pub fn table_code(component_type: ComponentType) -> u32 {
    TCODE_TABLE_BASE + component_type as u32
}

/// Returns the component type stored by a table type code.
pub fn table_type(type_code: u32) -> Option<ComponentType> {
    let offset = type_code.checked_sub(TCODE_TABLE_BASE)?;
    let tag = u8::try_from(offset).ok()?;
    ComponentType::from_u8(tag).filter(|t| *t != ComponentType::Unset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_code_roundtrip() {
        for ty in ComponentType::ALL {
            assert_eq!(table_type(table_code(ty)), Some(ty));
            assert!(is_versioned(table_code(ty)));
        }
        assert_eq!(table_type(TCODE_PROPERTIES), None);
        assert_eq!(table_type(TCODE_TABLE_BASE), None);
    }

    #[test]
    fn test_end_of_file_is_plain() {
        assert!(!is_versioned(TCODE_END_OF_FILE));
        assert!(is_versioned(TCODE_COMPONENT_RECORD));
    }
}
