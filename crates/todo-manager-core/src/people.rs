use todo_manager_shared::{DEFAULT_PERSON_COLOR, Person, PersonRef, Todo};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Badge {
    pub person_id: String,
    pub name: String,
    pub color: String,
}

/// Looks a reference up in the snapshot's person list. Only the id of an
/// embedded record is used; the snapshot copy is authoritative.
pub fn resolve<'a>(reference: &PersonRef, persons: &'a [Person]) -> Option<&'a Person> {
    let id = reference.id();
    persons.iter().find(|person| person.id == id)
}

/// Badges for a todo's assignees, in assignment order. References that do
/// not resolve are skipped.
pub fn resolve_badges(todo: &Todo, persons: &[Person]) -> Vec<Badge> {
    todo.persons
        .iter()
        .filter_map(|reference| {
            let Some(person) = resolve(reference, persons) else {
                tracing::trace!(
                    todo_id = %todo.id,
                    person_id = %reference.id(),
                    "assignee not in snapshot"
                );
                return None;
            };
            Some(Badge {
                person_id: person.id.clone(),
                name: person.name.clone(),
                color: display_color(&person.color).to_string(),
            })
        })
        .collect()
}

pub fn display_color(color: &str) -> &str {
    match color.trim() {
        "" => DEFAULT_PERSON_COLOR,
        other => other,
    }
}
