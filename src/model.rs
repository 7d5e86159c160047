//! Cross-page assembly: merges family pages, back-fills sex, checks that
//! every family pointer a person page implies has a family record behind it.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::error::ConvertError;
use crate::family_key::FamilyKey;
use crate::gedcom::builder::citation_order;
use crate::gedcom::sources::CitationStore;
use crate::parser::family::{Child, FamilyEvent};
use crate::parser::fields::Sex;
use crate::parser::{FamilyRecord, PersonRecord};
use crate::report::RunReport;

/// A family with all of its pages merged.
#[derive(Debug, Clone, PartialEq)]
pub struct Family {
    key: FamilyKey,
    husband: Option<u32>,
    wife: Option<u32>,
    /// SPOUSE parents not yet slotted as husband or wife.
    unslotted: Vec<u32>,
    events: Vec<FamilyEvent>,
    children: Vec<Child>,
}

impl Family {
    fn from_record(record: &FamilyRecord) -> Family {
        let mut family = Family {
            key: record.key(),
            husband: None,
            wife: None,
            unslotted: Vec::new(),
            events: Vec::new(),
            children: Vec::new(),
        };
        family.merge(record);
        family
    }

    /// Later pages add to what earlier pages said; nothing is overwritten.
    fn merge(&mut self, record: &FamilyRecord) {
        self.husband = self.husband.or(record.husband());
        self.wife = self.wife.or(record.wife());
        for &spouse in record.spouses() {
            if !self.unslotted.contains(&spouse) {
                self.unslotted.push(spouse);
            }
        }
        for event in record.events() {
            if !self.events.contains(event) {
                self.events.push(event.clone());
            }
        }
        for child in record.children() {
            match self.children.iter_mut().find(|known| known.id == child.id) {
                Some(known) => {
                    known.sex = known.sex.or(child.sex);
                    known.uncertain |= child.uncertain;
                }
                None => self.children.push(child.clone()),
            }
        }
    }

    /// Place remarriage-page spouses in the husband/wife slots by sex.
    fn slot_spouses(&mut self, sexes: &SexTable, report: &mut RunReport) {
        for spouse in std::mem::take(&mut self.unslotted) {
            if self.husband == Some(spouse) || self.wife == Some(spouse) {
                continue;
            }
            let slot = match sexes.get(spouse) {
                Some(Sex::Male) if self.husband.is_none() => &mut self.husband,
                Some(Sex::Female) if self.wife.is_none() => &mut self.wife,
                _ => {
                    report.warn(&format!(
                        "family {}: cannot tell whether spouse {} is husband or wife, using first free slot",
                        self.key, spouse
                    ));
                    if self.husband.is_none() {
                        &mut self.husband
                    } else {
                        &mut self.wife
                    }
                }
            };
            if slot.is_none() {
                *slot = Some(spouse);
            }
        }
    }

    pub fn key(&self) -> FamilyKey {
        self.key
    }

    pub fn husband(&self) -> Option<u32> {
        self.husband
    }

    pub fn wife(&self) -> Option<u32> {
        self.wife
    }

    pub fn events(&self) -> &[FamilyEvent] {
        &self.events
    }

    /// Children in the order their rows were first seen.
    pub fn children(&self) -> &[Child] {
        &self.children
    }

    pub fn child(&self, id: u32) -> Option<&Child> {
        self.children.iter().find(|child| child.id == id)
    }

    fn parents(&self) -> impl Iterator<Item = u32> + '_ {
        self.husband
            .iter()
            .chain(&self.wife)
            .chain(&self.unslotted)
            .copied()
    }
}

/// Sex back-filled from family records. The first assignment wins.
#[derive(Debug, Default)]
pub struct SexTable {
    sexes: HashMap<u32, Sex>,
}

impl SexTable {
    pub fn record(&mut self, id: u32, sex: Sex, report: &mut RunReport) {
        match self.sexes.get(&id).copied() {
            None => {
                self.sexes.insert(id, sex);
            }
            Some(known) if known != sex => report.warn(&format!(
                "person {id} is listed as both {} and {}; keeping {}",
                known.letter(),
                sex.letter(),
                known.letter()
            )),
            Some(_) => {}
        }
    }

    pub fn get(&self, id: u32) -> Option<Sex> {
        self.sexes.get(&id).copied()
    }

    fn from_families(families: &[Family], report: &mut RunReport) -> SexTable {
        let mut table = SexTable::default();
        for family in families {
            if let Some(husband) = family.husband {
                table.record(husband, Sex::Male, report);
            }
            if let Some(wife) = family.wife {
                table.record(wife, Sex::Female, report);
            }
            for child in &family.children {
                if let Some(sex) = child.sex {
                    table.record(child.id, sex, report);
                }
            }
        }
        table
    }
}

/// A person ready for tree building.
#[derive(Debug, Clone)]
pub struct Individual {
    pub record: PersonRecord,
    pub sex: Option<Sex>,
    /// The person's row in the primary family is marked uncertain.
    pub uncertain_parents: bool,
    pub spouse_families: Vec<FamilyKey>,
}

/// Everything a GEDCOM file is built from.
#[derive(Debug)]
pub struct Genealogy {
    pub individuals: Vec<Individual>,
    pub families: Vec<Family>,
    pub citations: CitationStore,
}

/// Collects parsed pages of one run.
#[derive(Debug, Default)]
pub struct Assembler {
    families: Vec<Family>,
    family_index: HashMap<FamilyKey, usize>,
    persons: Vec<PersonRecord>,
    person_ids: HashSet<u32>,
    citations: CitationStore,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_family_page(&mut self, record: &FamilyRecord) {
        match self.family_index.get(&record.key()) {
            Some(&idx) => {
                debug!(family = %record.key(), "merging continuation page");
                self.families[idx].merge(record);
            }
            None => {
                self.family_index.insert(record.key(), self.families.len());
                self.families.push(Family::from_record(record));
            }
        }
    }

    pub fn add_person(&mut self, record: PersonRecord) -> Result<(), ConvertError> {
        if !self.person_ids.insert(record.id()) {
            return Err(ConvertError::DuplicatePerson(record.id()));
        }
        for title in citation_order(&record) {
            self.citations.intern(title);
        }
        self.persons.push(record);
        Ok(())
    }

    pub fn family_count(&self) -> usize {
        self.families.len()
    }

    pub fn finish(mut self, report: &mut RunReport) -> Result<Genealogy, ConvertError> {
        let sexes = SexTable::from_families(&self.families, report);
        for family in &mut self.families {
            family.slot_spouses(&sexes, report);
        }

        let mut parent_of: HashMap<u32, Vec<FamilyKey>> = HashMap::new();
        for family in &self.families {
            for parent in family.parents() {
                parent_of.entry(parent).or_default().push(family.key);
            }
            for id in family.parents().chain(family.children.iter().map(|c| c.id)) {
                if !self.person_ids.contains(&id) {
                    report.warn(&format!("family {}: person {} has no person page", family.key, id));
                }
            }
        }

        let persons = std::mem::take(&mut self.persons);
        let mut individuals = Vec::with_capacity(persons.len());
        for record in persons {
            let id = record.id();
            for key in record.parent_sets().iter().filter_map(|set| set.family_key()) {
                self.require_family(id, key)?;
            }

            let mut spouse_families = record.spouse_families();
            for &key in &spouse_families {
                self.require_family(id, key)?;
            }
            for &key in parent_of.get(&id).into_iter().flatten() {
                if !spouse_families.contains(&key) {
                    spouse_families.push(key);
                }
            }

            let uncertain_parents = match record.primary_family() {
                Some(key) => {
                    let family = self.require_family(id, key)?;
                    match family.child(id) {
                        Some(child) => child.uncertain,
                        None => {
                            report.warn(&format!("person {id} is not listed as a child of family {key}"));
                            false
                        }
                    }
                }
                None => false,
            };

            individuals.push(Individual {
                sex: sexes.get(id),
                uncertain_parents,
                spouse_families,
                record,
            });
        }

        report.set_totals(self.families.len(), self.citations.len());
        Ok(Genealogy {
            individuals,
            families: self.families,
            citations: self.citations,
        })
    }

    fn require_family(&self, person: u32, key: FamilyKey) -> Result<&Family, ConvertError> {
        self.family_index
            .get(&key)
            .map(|&idx| &self.families[idx])
            .ok_or(ConvertError::MissingFamily { person, key })
    }
}
