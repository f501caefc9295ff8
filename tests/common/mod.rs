#![allow(dead_code)]

//! Shared fixtures: a small pet store with a typed resource and a few
//! capability-declaring types.

use brrtrest::capability::{CapabilityBuilder, DeclareCapabilities};
use brrtrest::identity::{Address, Identity, Resource};
use brrtrest::result::{FailureOn, RestResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pet {
    pub id: u64,
    pub name: String,
    pub owner: u64,
}

impl Resource for Pet {
    fn identity(&self) -> Option<Address> {
        Some(Address::of::<Pet>(self.id))
    }
}

/// Resource type served by no repository.
#[derive(Debug)]
pub struct Owner;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct PetUpdate {
    pub name: String,
}

/// In-memory pet store declaring GET, PUT and DELETE on `Pet`.
pub struct PetStore {
    pets: Mutex<HashMap<u64, Pet>>,
}

impl PetStore {
    pub fn seeded() -> Self {
        let mut pets = HashMap::new();
        pets.insert(
            1,
            Pet {
                id: 1,
                name: "rex".to_string(),
                owner: 7,
            },
        );
        pets.insert(
            2,
            Pet {
                id: 2,
                name: "tom".to_string(),
                owner: 8,
            },
        );
        Self {
            pets: Mutex::new(pets),
        }
    }

    pub fn rename(&self, id: u64, name: &str) {
        if let Some(pet) = self.pets.lock().unwrap().get_mut(&id) {
            pet.name = name.to_string();
        }
    }

    fn find(&self, id: &Identity<Pet>) -> RestResult<Pet> {
        let Ok(key) = id.value_as::<u64>() else {
            return RestResult::bad_request(serde_json::json!({ "error": "pet id must be a number" }));
        };
        match self.pets.lock().unwrap().get(&key) {
            Some(pet) => RestResult::ok(pet.clone()),
            None => RestResult::not_found(FailureOn::Resource),
        }
    }

    fn update(&self, id: &Identity<Pet>, body: PetUpdate) -> RestResult<Pet> {
        let Ok(key) = id.value_as::<u64>() else {
            return RestResult::bad_request(serde_json::json!({ "error": "pet id must be a number" }));
        };
        let mut pets = self.pets.lock().unwrap();
        match pets.get_mut(&key) {
            Some(pet) => {
                pet.name = body.name;
                RestResult::ok(pet.clone())
            }
            None => RestResult::not_found(FailureOn::Resource),
        }
    }

    fn remove(&self, id: &Identity<Pet>) -> RestResult<()> {
        let Ok(key) = id.value_as::<u64>() else {
            return RestResult::not_found(FailureOn::Resource);
        };
        match self.pets.lock().unwrap().remove(&key) {
            Some(_) => RestResult::ok(()),
            None => RestResult::not_found(FailureOn::Resource),
        }
    }
}

impl DeclareCapabilities for PetStore {
    fn declare(builder: &mut CapabilityBuilder<Self>) {
        builder
            .get(|store, id: Identity<Pet>, (): (), _cancel: CancellationToken| {
                let result = store.find(&id);
                async move { Ok(result) }
            })
            .put(
                |store, id: Identity<Pet>, (): (), body: PetUpdate, _cancel: CancellationToken| {
                    let result = store.update(&id, body);
                    async move { Ok(result) }
                },
            )
            .delete(|store, id: Identity<Pet>, (): (), _cancel: CancellationToken| {
                let result = store.remove(&id);
                async move { Ok(result) }
            });
    }
}
