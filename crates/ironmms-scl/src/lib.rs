#![cfg_attr(doc, doc = include_str!("../README.md"))]

#[macro_use]
extern crate tracing;

use core::fmt;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use roxmltree::{Document, Node};

pub type SclResult<T> = Result<T, SclError>;

pub type SclError = ironmms_error::Error<SclErrorKind>;

#[non_exhaustive]
#[derive(Debug)]
pub enum SclErrorKind {
    Io,
    Xml,
    /// Structurally valid XML that is not a usable SCL document.
    Malformed { reason: &'static str },
}

impl fmt::Display for SclErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io => write!(f, "I/O error"),
            Self::Xml => write!(f, "XML parse error"),
            Self::Malformed { reason } => write!(f, "malformed SCL: {reason}"),
        }
    }
}

impl std::error::Error for SclErrorKind {}

/// Dataset reference (`DOMAIN/LN$DataSet`) to ordered member labels.
pub type DatasetLabels = BTreeMap<String, Vec<String>>;

/// Parses an SCL file into the dataset label mapping.
///
/// The MMS domain of a dataset is the IED name concatenated with the
/// logical device instance; the label of one FCDA is its `doName`, with
/// `.daName` appended when the FCDA addresses a single attribute.
pub fn parse(path: impl AsRef<Path>) -> SclResult<DatasetLabels> {
    let content = fs::read_to_string(path.as_ref())
        .map_err(|e| SclError::new("read SCL file", SclErrorKind::Io).caused_by(e))?;

    parse_str(&content)
}

/// Same as [`parse`], from already-loaded XML content.
pub fn parse_str(content: &str) -> SclResult<DatasetLabels> {
    let doc = Document::parse(content).map_err(|e| SclError::new("parse SCL", SclErrorKind::Xml).caused_by(e))?;

    let root = doc.root_element();

    if root.tag_name().name() != "SCL" {
        return Err(SclError::new(
            "parse SCL",
            SclErrorKind::Malformed {
                reason: "root element is not <SCL>",
            },
        ));
    }

    let mut datasets = DatasetLabels::new();

    for ied in root.children().filter(|n| n.is_element() && n.tag_name().name() == "IED") {
        let ied_name = ied.attribute("name").unwrap_or_default();

        for ldevice in ied
            .descendants()
            .filter(|n| n.is_element() && n.tag_name().name() == "LDevice")
        {
            let ld_inst = ldevice.attribute("inst").unwrap_or_default();
            let domain = format!("{ied_name}{ld_inst}");

            for ln in ldevice
                .children()
                .filter(|n| n.is_element() && matches!(n.tag_name().name(), "LN0" | "LN"))
            {
                let ln_name = logical_node_name(&ln);

                for dataset in ln
                    .children()
                    .filter(|n| n.is_element() && n.tag_name().name() == "DataSet")
                {
                    let Some(ds_name) = dataset.attribute("name") else {
                        debug!(%domain, "Skipping unnamed DataSet");
                        continue;
                    };

                    let labels: Vec<String> = dataset
                        .children()
                        .filter(|n| n.is_element() && n.tag_name().name() == "FCDA")
                        .map(|fcda| fcda_label(&fcda))
                        .collect();

                    let reference = format!("{domain}/{ln_name}${ds_name}");

                    debug!(%reference, members = labels.len(), "Dataset loaded");

                    datasets.insert(reference, labels);
                }
            }
        }
    }

    if datasets.is_empty() {
        warn!("SCL document contains no datasets");
    }

    Ok(datasets)
}

/// `prefix + lnClass + lnInst`; plain `LLN0` for LN0 elements.
fn logical_node_name(ln: &Node<'_, '_>) -> String {
    if ln.tag_name().name() == "LN0" {
        return "LLN0".to_owned();
    }

    format!(
        "{}{}{}",
        ln.attribute("prefix").unwrap_or_default(),
        ln.attribute("lnClass").unwrap_or_default(),
        ln.attribute("inst").unwrap_or_default(),
    )
}

/// Member label: `doName` or `doName.daName`.
fn fcda_label(fcda: &Node<'_, '_>) -> String {
    let do_name = fcda.attribute("doName").unwrap_or_default();

    match fcda.attribute("daName") {
        Some(da_name) if !da_name.is_empty() => format!("{do_name}.{da_name}"),
        _ => do_name.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<SCL xmlns="http://www.iec.ch/61850/2003/SCL">
  <IED name="VMC7_">
    <AccessPoint name="S1">
      <Server>
        <LDevice inst="1LD0">
          <LN0 lnClass="LLN0" inst="" lnType="LLN0_T">
            <DataSet name="DSET1">
              <FCDA ldInst="1LD0" lnClass="MMXU" lnInst="1" doName="PhV" daName="phsA.cVal.mag.f" fc="MX"/>
              <FCDA ldInst="1LD0" lnClass="MMXU" lnInst="1" doName="TotW" fc="MX"/>
            </DataSet>
          </LN0>
          <LN prefix="Q" lnClass="XCBR" inst="1" lnType="XCBR_T">
            <DataSet name="DSET2">
              <FCDA ldInst="1LD0" lnClass="XCBR" lnInst="1" doName="Pos" daName="stVal" fc="ST"/>
            </DataSet>
          </LN>
        </LDevice>
      </Server>
    </AccessPoint>
  </IED>
</SCL>"#;

    #[test]
    fn datasets_are_keyed_by_domain_and_logical_node() {
        let datasets = parse_str(SAMPLE).unwrap();

        assert_eq!(
            datasets.get("VMC7_1LD0/LLN0$DSET1").map(Vec::as_slice),
            Some(["PhV.phsA.cVal.mag.f".to_owned(), "TotW".to_owned()].as_slice())
        );
        assert_eq!(
            datasets.get("VMC7_1LD0/QXCBR1$DSET2").map(Vec::as_slice),
            Some(["Pos.stVal".to_owned()].as_slice())
        );
    }

    #[test]
    fn non_scl_document_is_rejected() {
        assert!(parse_str("<foo/>").is_err());
    }
}
