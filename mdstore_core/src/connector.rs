//! Lazy proxy between an in-memory object and its stored form.

use crate::backend::{Backend, open_backend};
use crate::error::{Error, Result};
use crate::mapper::MappedObject;
use crate::reference::Reference;
use crate::tracker::ObjectReferenceTracker;
use tracing::debug;

#[derive(Debug, Clone)]
enum State<T> {
    /// Object in memory. `reference` is where it was last stored; `dirty`
    /// means it may have changed since.
    Loaded {
        object: T,
        reference: Option<Reference>,
        dirty: bool,
    },
    /// Only the location is known.
    Unloaded(Reference),
}

/// Holds either an object or a [`Reference`] to it, loading on first access
/// and storing on [`save_object`](Connector::save_object).
#[derive(Debug, Clone)]
pub struct Connector<T> {
    state: State<T>,
}

impl<T: MappedObject> Connector<T> {
    /// A connector for an object that has not been stored yet.
    pub fn from_object(object: T) -> Self {
        Self {
            state: State::Loaded {
                object,
                reference: None,
                dirty: true,
            },
        }
    }

    /// A connector for a stored object; nothing is loaded until accessed.
    pub fn from_reference(reference: Reference) -> Self {
        Self {
            state: State::Unloaded(reference),
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, State::Loaded { .. })
    }

    /// True if the object was handed out for mutation since it was last
    /// stored, or was never stored.
    pub fn is_dirty(&self) -> bool {
        matches!(self.state, State::Loaded { dirty: true, .. })
    }

    /// True if the object, or a connector nested anywhere inside it, holds
    /// changes that are not stored yet.
    pub fn is_modified(&self) -> bool {
        match &self.state {
            State::Loaded { dirty: true, .. } => true,
            State::Loaded { object, .. } => object.has_unsaved_children(),
            State::Unloaded(_) => false,
        }
    }

    /// Where the object was last stored, if anywhere.
    pub fn reference(&self) -> Option<&Reference> {
        match &self.state {
            State::Loaded { reference, .. } => reference.as_ref(),
            State::Unloaded(reference) => Some(reference),
        }
    }

    /// The in-memory object, without loading.
    pub fn object(&self) -> Option<&T> {
        match &self.state {
            State::Loaded { object, .. } => Some(object),
            State::Unloaded(_) => None,
        }
    }

    /// Reference of a stored, unmodified object.
    fn persisted_reference(&self) -> Option<&Reference> {
        match &self.state {
            State::Unloaded(reference) => Some(reference),
            State::Loaded { .. } if self.is_modified() => None,
            State::Loaded { reference, .. } => reference.as_ref(),
        }
    }

    /// The object, loaded from its backend first if necessary.
    pub fn get_object(&mut self) -> Result<&T> {
        let (object, _, _) = self.loaded_parts()?;
        Ok(object)
    }

    /// Mutable access to the object; marks the connector dirty.
    pub fn get_object_mut(&mut self) -> Result<&mut T> {
        let (object, _, dirty) = self.loaded_parts()?;
        *dirty = true;
        Ok(object)
    }

    /// Mutable access for reaching nested connectors, for example to read a
    /// lazily loaded leaf of a stored tree, without marking this connector
    /// dirty.
    ///
    /// Changes made through nested connectors are still noticed by
    /// [`is_modified`](Connector::is_modified), and so by `save_object` and
    /// `unget`. Changes to the object's own fields are not: use
    /// [`get_object_mut`](Connector::get_object_mut) for those.
    pub fn get_object_nested(&mut self) -> Result<&mut T> {
        let (object, _, _) = self.loaded_parts()?;
        Ok(object)
    }

    fn loaded_parts(&mut self) -> Result<(&mut T, &mut Option<Reference>, &mut bool)> {
        if let State::Unloaded(reference) = &self.state {
            let object = load_object(reference)?;
            self.state = State::Loaded {
                object,
                reference: Some(reference.clone()),
                dirty: false,
            };
        }

        match &mut self.state {
            State::Loaded {
                object,
                reference,
                dirty,
            } => Ok((object, reference, dirty)),
            State::Unloaded(_) => unreachable!("connector state was loaded above"),
        }
    }

    /// Store the object in `backend` unless it is already stored there
    /// unmodified; returns the object's reference.
    ///
    /// An object stored in another realm is loaded from there and stored
    /// again in `backend`.
    pub fn save_object(
        &mut self,
        backend: &dyn Backend,
        tracker: &mut ObjectReferenceTracker,
    ) -> Result<&Reference> {
        let stored_here = self.persisted_reference().is_some_and(|reference| {
            reference.mapper_family() == backend.family() && reference.realm() == backend.realm()
        });
        if stored_here {
            return self
                .reference()
                .ok_or_else(|| Error::not_persisted("connector lost its reference"));
        }

        let (object, reference, dirty) = self.loaded_parts()?;
        let location = object.unmap(backend, tracker)?;
        *dirty = false;

        debug!(
            class_name = T::CLASS_NAME,
            realm = backend.realm(),
            %location,
            "saved object"
        );
        let reference: &Reference = reference.insert(Reference::new(
            backend.family(),
            backend.realm(),
            T::CLASS_NAME,
            location.to_hex(),
        ));
        Ok(reference)
    }

    /// Drop the in-memory object, keeping only its reference.
    ///
    /// Fails with `NotPersisted` if the object was never stored or was
    /// modified after it was stored. Unloaded connectors are left as is.
    pub fn unget(&mut self) -> Result<()> {
        let reference = match &self.state {
            State::Unloaded(_) => return Ok(()),
            State::Loaded {
                reference: None, ..
            } => {
                return Err(Error::not_persisted(format!(
                    "{} was never saved",
                    T::CLASS_NAME
                )));
            }
            State::Loaded {
                reference: Some(reference),
                ..
            } => reference.clone(),
        };
        if self.is_modified() {
            return Err(Error::not_persisted(format!(
                "{} was modified after it was saved",
                T::CLASS_NAME
            )));
        }

        self.state = State::Unloaded(reference);
        Ok(())
    }

    /// A connector to an equal object stored in `backend`.
    ///
    /// An unsaved or modified object is copied in memory only. A stored
    /// object is copied and saved; if it was not loaded, the copy is
    /// unloaded again. `self` is not modified.
    pub fn deepcopy(
        &self,
        backend: &dyn Backend,
        tracker: &mut ObjectReferenceTracker,
    ) -> Result<Self> {
        match &self.state {
            State::Loaded {
                object,
                reference: Some(_),
                ..
            } if !self.is_modified() => {
                let mut copy = Self::from_object(object.deepcopy(backend, tracker)?);
                copy.save_object(backend, tracker)?;
                Ok(copy)
            }
            State::Loaded { object, .. } => {
                Ok(Self::from_object(object.deepcopy(backend, tracker)?))
            }
            State::Unloaded(reference) => {
                let object = load_object::<T>(reference)?;
                let mut copy = Self::from_object(object.deepcopy(backend, tracker)?);
                copy.save_object(backend, tracker)?;
                copy.unget()?;
                Ok(copy)
            }
        }
    }
}

fn load_object<T: MappedObject>(reference: &Reference) -> Result<T> {
    let load_error = |reason: &dyn std::fmt::Display| {
        Error::backend_load(
            reference.class_name(),
            reference.realm(),
            reference.location(),
            reason,
        )
    };

    if reference.is_none() {
        return Err(load_error(&"the none reference points nowhere"));
    }
    if reference.class_name() != T::CLASS_NAME {
        return Err(load_error(&format!("expected a {}", T::CLASS_NAME)));
    }

    let location = reference.location_hash().map_err(|e| load_error(&e))?;
    let backend =
        open_backend(reference.mapper_family(), reference.realm()).map_err(|e| load_error(&e))?;
    let object = T::map(backend.as_ref(), &location).map_err(|e| load_error(&e))?;

    debug!(
        class_name = T::CLASS_NAME,
        realm = reference.realm(),
        %location,
        "loaded object"
    );
    Ok(object)
}

/// Stored connectors compare by location and class; unsaved or modified
/// ones compare by object. A stored connector never equals an unsaved one.
impl<T: MappedObject + PartialEq> PartialEq for Connector<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self.persisted_reference(), other.persisted_reference()) {
            (Some(a), Some(b)) => a.location() == b.location() && a.class_name() == b.class_name(),
            (None, None) => self.object() == other.object(),
            _ => false,
        }
    }
}
