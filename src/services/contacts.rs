use std::sync::Arc;
use uuid::Uuid;

use crate::auth::Principal;
use crate::domain::aggregates::{Contact, ContactKind};
use crate::store::Store;
use crate::{Result, ShopError};

const MAX_CONTACT_LEN: usize = 100;

/// Delivery contacts of the calling user. Other users' contacts look absent.
#[derive(Clone)]
pub struct ContactService {
    store: Arc<dyn Store>,
}

impl ContactService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create(&self, principal: &Principal, kind: ContactKind, value: &str) -> Result<Contact> {
        let value = value.trim();
        if value.is_empty() {
            return Err(ShopError::validation("contact value is empty"));
        }
        if value.chars().count() > MAX_CONTACT_LEN {
            return Err(ShopError::validation(format!("contact value longer than {MAX_CONTACT_LEN} characters")));
        }
        let contact = Contact::new(principal.user_id, kind, value);
        self.store.insert_contact(&contact).await?;
        Ok(contact)
    }

    pub async fn list(&self, principal: &Principal) -> Result<Vec<Contact>> {
        Ok(self.store.contacts_for_user(principal.user_id).await?)
    }

    pub async fn get(&self, principal: &Principal, id: Uuid) -> Result<Contact> {
        self.store
            .find_contact(id)
            .await?
            .filter(|c| c.is_owned_by(principal.user_id))
            .ok_or_else(|| ShopError::not_found(format!("contact {id}")))
    }

    pub async fn delete(&self, principal: &Principal, id: Uuid) -> Result<()> {
        let contact = self.get(principal, id).await?;
        if !self.store.delete_contact(contact.id).await? {
            return Err(ShopError::not_found(format!("contact {id}")));
        }
        Ok(())
    }
}
