//! Datasource → datatype registry.
//!
//! Every `AssociationScore` is pre-seeded from this table so that absent
//! categories read as zero. It is always passed in explicitly.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Closed mapping of datasource id to datatype id (many-to-one).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasourceRegistry {
    mapping: BTreeMap<String, String>,
}

impl DatasourceRegistry {
    pub fn new<I, S, T>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            mapping: pairs
                .into_iter()
                .map(|(ds, dt)| (ds.into(), dt.into()))
                .collect(),
        }
    }

    /// Datatype a datasource belongs to, if registered.
    pub fn datatype_of(&self, datasource: &str) -> Option<&str> {
        self.mapping.get(datasource).map(String::as_str)
    }

    pub fn contains_datasource(&self, datasource: &str) -> bool {
        self.mapping.contains_key(datasource)
    }

    pub fn datasources(&self) -> impl Iterator<Item = &str> {
        self.mapping.keys().map(String::as_str)
    }

    /// Distinct datatypes, sorted.
    pub fn datatypes(&self) -> BTreeSet<&str> {
        self.mapping.values().map(String::as_str).collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.mapping.iter().map(|(ds, dt)| (ds.as_str(), dt.as_str()))
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}

impl Default for DatasourceRegistry {
    /// Built-in platform datasources.
    fn default() -> Self {
        Self::new([
            ("expression_atlas",   "rna_expression"),
            ("uniprot",            "genetic_association"),
            ("gwas_catalog",       "genetic_association"),
            ("eva",                "genetic_association"),
            ("uniprot_literature", "genetic_association"),
            ("gene2phenotype",     "genetic_association"),
            ("phenodigm",          "animal_model"),
            ("chembl",             "known_drug"),
            ("europepmc",          "literature"),
            ("disgenet",           "literature"),
            ("cancer_gene_census", "somatic_mutation"),
            ("eva_somatic",        "somatic_mutation"),
            ("intogen",            "somatic_mutation"),
            ("reactome",           "affected_pathway"),
        ])
    }
}
