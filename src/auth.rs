//! Caller identity.
//!
//! Authentication happens upstream; this crate only consumes the resulting
//! identity and the supplier capability flag.

use uuid::Uuid;

use crate::{Result, ShopError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub supplier: bool,
}

impl Principal {
    pub fn customer(user_id: Uuid, email: Option<String>) -> Self {
        Self { user_id, email, supplier: false }
    }

    pub fn supplier(user_id: Uuid, email: Option<String>) -> Self {
        Self { user_id, email, supplier: true }
    }

    pub fn require_supplier(&self) -> Result<()> {
        if self.supplier {
            Ok(())
        } else {
            Err(ShopError::Forbidden("supplier account required".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supplier_capability() {
        assert!(Principal::supplier(Uuid::now_v7(), None).require_supplier().is_ok());
        let err = Principal::customer(Uuid::now_v7(), None).require_supplier().unwrap_err();
        assert_eq!(err.kind(), "forbidden");
    }
}
