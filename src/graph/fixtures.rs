//! Small synthetic family graphs shared by the traversal tests.

use chrono::NaiveDate;

use super::{GenderCode, MemoryGraph, Person, PersonId};

pub(crate) const MALE: i64 = 1;
pub(crate) const FEMALE: i64 = 2;

/// Empty graph with gender ids 1 = male, 2 = female.
pub(crate) fn graph() -> MemoryGraph {
    let mut g = MemoryGraph::new();
    g.add_gender(MALE, GenderCode::Male).add_gender(FEMALE, GenderCode::Female);
    g
}

/// Living, active person born on 1 January of `born`.
pub(crate) fn person(id: PersonId, first_name: &str, gender_id: i64, born: i32) -> Person {
    let mut p = Person::new(id, first_name, "Family");
    p.gender_id = Some(gender_id);
    p.date_of_birth = NaiveDate::from_ymd_opt(born, 1, 1);
    p
}

pub(crate) const GRANDPA: PersonId = 1;
pub(crate) const GRANDMA: PersonId = 2;
pub(crate) const DAD: PersonId = 3;
pub(crate) const MOM: PersonId = 4;
pub(crate) const ME: PersonId = 5;
pub(crate) const SISTER: PersonId = 6;
pub(crate) const UNCLE: PersonId = 7;
pub(crate) const COUSIN: PersonId = 8;

/// Three generations, every tie stored as a pair:
///
/// ```text
/// GRANDPA(+) = GRANDMA
///      |            |
///     DAD = MOM   UNCLE
///       |            |
///   ME, SISTER    COUSIN
/// ```
///
/// GRANDPA has a death date; everyone else is living.
pub(crate) fn family() -> MemoryGraph {
    use super::RelationshipType::*;

    let mut grandpa = person(GRANDPA, "Gopal", MALE, 1930);
    grandpa.date_of_death = NaiveDate::from_ymd_opt(2010, 5, 1);

    let mut g = graph();
    g.add_person(grandpa)
        .add_person(person(GRANDMA, "Gita", FEMALE, 1932))
        .add_person(person(DAD, "Dev", MALE, 1960))
        .add_person(person(MOM, "Maya", FEMALE, 1962))
        .add_person(person(ME, "Mohan", MALE, 1990))
        .add_person(person(SISTER, "Sita", FEMALE, 1993))
        .add_person(person(UNCLE, "Uday", MALE, 1965))
        .add_person(person(COUSIN, "Chitra", FEMALE, 1995))
        .add_pair(GRANDPA, GRANDMA, Wife, Husband)
        .add_pair(GRANDPA, DAD, Son, Father)
        .add_pair(GRANDMA, DAD, Son, Mother)
        .add_pair(GRANDPA, UNCLE, Son, Father)
        .add_pair(GRANDMA, UNCLE, Son, Mother)
        .add_pair(DAD, MOM, Wife, Husband)
        .add_pair(DAD, ME, Son, Father)
        .add_pair(MOM, ME, Son, Mother)
        .add_pair(DAD, SISTER, Daughter, Father)
        .add_pair(MOM, SISTER, Daughter, Mother)
        .add_pair(UNCLE, COUSIN, Daughter, Father);
    g
}
