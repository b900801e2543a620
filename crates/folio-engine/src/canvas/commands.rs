use serde::{Deserialize, Serialize};

use crate::canvas::{CanvasObject, ObjectId, Scene};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Object {0} is not on the canvas")]
    UnknownObject(ObjectId),
    #[error("Object {0} is already on the canvas")]
    DuplicateObject(ObjectId),
}

/// An object together with the index it occupied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placed {
    pub index: usize,
    pub object: CanvasObject,
}

/// A reversible structural edit.
///
/// `Remove`, `Modify` and `Clear` hold what they replace; build them with the
/// constructors below so that state is captured from the scene they target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Command {
    Add {
        objects: Vec<CanvasObject>,
    },
    Remove {
        /// Ascending by index
        objects: Vec<Placed>,
    },
    Modify {
        objects: Vec<CanvasObject>,
        previous: Vec<CanvasObject>,
    },
    Clear {
        objects: Vec<CanvasObject>,
    },
}

impl Command {
    pub fn add(objects: Vec<CanvasObject>) -> Self {
        Command::Add { objects }
    }

    pub fn remove(scene: &Scene, ids: &[ObjectId]) -> Result<Self, CommandError> {
        let mut objects = ids
            .iter()
            .map(|&id| {
                let index = scene.position(id).ok_or(CommandError::UnknownObject(id))?;
                Ok(Placed {
                    index,
                    object: scene.objects[index].clone(),
                })
            })
            .collect::<Result<Vec<_>, CommandError>>()?;
        objects.sort_by_key(|placed| placed.index);
        objects.dedup_by_key(|placed| placed.index);
        Ok(Command::Remove { objects })
    }

    pub fn modify(scene: &Scene, updated: Vec<CanvasObject>) -> Result<Self, CommandError> {
        let previous = updated
            .iter()
            .map(|object| {
                scene
                    .get(object.id)
                    .cloned()
                    .ok_or(CommandError::UnknownObject(object.id))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Command::Modify {
            objects: updated,
            previous,
        })
    }

    pub fn clear(scene: &Scene) -> Self {
        Command::Clear {
            objects: scene.objects.clone(),
        }
    }

    pub fn apply(&self, scene: &Scene) -> Result<Scene, CommandError> {
        match self {
            Command::Add { objects } => append(scene, objects),
            Command::Remove { objects } => {
                let ids: Vec<ObjectId> = objects.iter().map(|p| p.object.id).collect();
                remove_ids(scene, &ids)
            }
            Command::Modify { objects, .. } => replace(scene, objects),
            Command::Clear { .. } => Ok(Scene::new()),
        }
    }

    pub fn reverse(&self, scene: &Scene) -> Result<Scene, CommandError> {
        match self {
            Command::Add { objects } => {
                let ids: Vec<ObjectId> = objects.iter().map(|o| o.id).collect();
                remove_ids(scene, &ids)
            }
            Command::Remove { objects } => reinsert(scene, objects),
            Command::Modify { previous, .. } => replace(scene, previous),
            Command::Clear { objects } => {
                let mut restored = objects.clone();
                for object in &scene.objects {
                    if objects.iter().any(|o| o.id == object.id) {
                        return Err(CommandError::DuplicateObject(object.id));
                    }
                    restored.push(object.clone());
                }
                Ok(Scene::from_objects(restored))
            }
        }
    }

    /// Short label for undo/redo menus, e.g. "Add circle"
    pub fn description(&self) -> String {
        let (verb, objects): (&str, Vec<&CanvasObject>) = match self {
            Command::Add { objects } => ("Add", objects.iter().collect()),
            Command::Remove { objects } => ("Delete", objects.iter().map(|p| &p.object).collect()),
            Command::Modify { objects, .. } => ("Edit", objects.iter().collect()),
            Command::Clear { .. } => return "Clear canvas".to_string(),
        };
        match objects.as_slice() {
            [single] => format!("{verb} {}", single.shape.name()),
            many => format!("{verb} {} objects", many.len()),
        }
    }
}

fn append(scene: &Scene, objects: &[CanvasObject]) -> Result<Scene, CommandError> {
    let mut next = scene.objects.clone();
    for object in objects {
        if next.iter().any(|o| o.id == object.id) {
            return Err(CommandError::DuplicateObject(object.id));
        }
        next.push(object.clone());
    }
    Ok(Scene::from_objects(next))
}

fn remove_ids(scene: &Scene, ids: &[ObjectId]) -> Result<Scene, CommandError> {
    if let Some(&missing) = ids.iter().find(|&&id| !scene.contains(id)) {
        return Err(CommandError::UnknownObject(missing));
    }
    let next = scene
        .objects
        .iter()
        .filter(|object| !ids.contains(&object.id))
        .cloned()
        .collect();
    Ok(Scene::from_objects(next))
}

fn replace(scene: &Scene, objects: &[CanvasObject]) -> Result<Scene, CommandError> {
    let mut next = scene.objects.clone();
    for object in objects {
        let index = scene
            .position(object.id)
            .ok_or(CommandError::UnknownObject(object.id))?;
        next[index] = object.clone();
    }
    Ok(Scene::from_objects(next))
}

/// Put removed objects back at the indices they were taken from
fn reinsert(scene: &Scene, placed: &[Placed]) -> Result<Scene, CommandError> {
    let mut next = scene.objects.clone();
    for Placed { index, object } in placed {
        if scene.contains(object.id) {
            return Err(CommandError::DuplicateObject(object.id));
        }
        next.insert((*index).min(next.len()), object.clone());
    }
    Ok(Scene::from_objects(next))
}
