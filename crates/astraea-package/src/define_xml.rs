//! Define-XML output generation (ODM 1.3.2 wrapper, define-2.0 extension).

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use astraea_exec::frame::DomainFrame;
use astraea_exec::handlers::find_column;
use astraea_model::{DomainClass, DomainMappingSpec, VariableDataType, VariableOrigin};
use astraea_reference::ReferenceStore;

const ODM_NS: &str = "http://www.cdisc.org/ns/odm/v1.3";
const DEFINE_XML_NS: &str = "http://www.cdisc.org/ns/def/v2.0";
const XLINK_NS: &str = "http://www.w3.org/1999/xlink";
const DEFINE_XML_VERSION: &str = "2.0.0";

/// Options for Define-XML output.
#[derive(Debug, Clone)]
pub struct DefineXmlOptions {
    pub sdtm_ig_version: String,
    pub context: String,
}

impl Default for DefineXmlOptions {
    fn default() -> Self {
        Self {
            sdtm_ig_version: "3.4".to_string(),
            context: "Submission".to_string(),
        }
    }
}

/// One dataset entering the define.xml, with its spec when it came through
/// the mapping flow (trial-design builders have no spec).
pub struct DefineEntry<'a> {
    pub frame: &'a DomainFrame,
    pub spec: Option<&'a DomainMappingSpec>,
}

struct CodeListSpec {
    name: String,
    values: Vec<String>,
    extensible: bool,
}

/// Write define.xml for the supplied datasets.
pub fn write_define_xml(
    output_path: &Path,
    study_id: &str,
    entries: &[DefineEntry<'_>],
    reference: &ReferenceStore,
    options: &DefineXmlOptions,
) -> Result<()> {
    anyhow::ensure!(!entries.is_empty(), "no datasets supplied for define-xml");

    let study_oid = format!("STDY.{study_id}");
    let file_oid = format!("{study_oid}.Define-XML_{DEFINE_XML_VERSION}");
    let mdv_oid = format!("MDV.{study_oid}.SDTMIG.{}", options.sdtm_ig_version);
    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
    }
    let file =
        File::create(output_path).with_context(|| format!("create {}", output_path.display()))?;
    let writer = BufWriter::new(file);
    let mut xml = Writer::new_with_indent(writer, b' ', 2);

    xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new("ODM");
    root.push_attribute(("xmlns", ODM_NS));
    root.push_attribute(("xmlns:def", DEFINE_XML_NS));
    root.push_attribute(("xmlns:xlink", XLINK_NS));
    root.push_attribute(("FileType", "Snapshot"));
    root.push_attribute(("FileOID", file_oid.as_str()));
    root.push_attribute(("ODMVersion", "1.3.2"));
    root.push_attribute(("CreationDateTime", timestamp.as_str()));
    root.push_attribute(("Originator", "Astraea"));
    root.push_attribute(("SourceSystem", "Astraea"));
    root.push_attribute(("def:Context", options.context.as_str()));
    xml.write_event(Event::Start(root))?;

    let mut study = BytesStart::new("Study");
    study.push_attribute(("OID", study_oid.as_str()));
    xml.write_event(Event::Start(study))?;

    xml.write_event(Event::Start(BytesStart::new("GlobalVariables")))?;
    write_text_element(&mut xml, "StudyName", study_id)?;
    write_text_element(
        &mut xml,
        "StudyDescription",
        &format!("SDTM submission for {study_id}"),
    )?;
    write_text_element(&mut xml, "ProtocolName", study_id)?;
    xml.write_event(Event::End(BytesEnd::new("GlobalVariables")))?;

    let mut metadata = BytesStart::new("MetaDataVersion");
    metadata.push_attribute(("OID", mdv_oid.as_str()));
    let mdv_name = format!("Study {study_id}, Data Definitions");
    metadata.push_attribute(("Name", mdv_name.as_str()));
    metadata.push_attribute(("def:DefineVersion", DEFINE_XML_VERSION));
    let ig_name = format!("SDTM-IG {}", options.sdtm_ig_version);
    metadata.push_attribute(("def:StandardName", ig_name.as_str()));
    metadata.push_attribute(("def:StandardVersion", options.sdtm_ig_version.as_str()));
    xml.write_event(Event::Start(metadata))?;

    let mut code_lists: BTreeMap<String, CodeListSpec> = BTreeMap::new();

    // ItemGroupDef per dataset, with def:leaf hrefs.
    for entry in entries {
        write_item_group(&mut xml, entry, reference)?;
    }

    // ItemDef per variable.
    for entry in entries {
        write_item_defs(&mut xml, entry, reference, &mut code_lists)?;
    }

    // ValueListDef + WhereClauseDef for Findings domains.
    for entry in entries {
        write_value_lists(&mut xml, entry, reference)?;
    }

    // CodeLists referenced by the ItemDefs.
    for (oid, list) in &code_lists {
        let mut node = BytesStart::new("CodeList");
        node.push_attribute(("OID", oid.as_str()));
        node.push_attribute(("Name", list.name.as_str()));
        node.push_attribute(("DataType", "text"));
        if list.extensible {
            node.push_attribute(("def:Extensible", "Yes"));
        }
        xml.write_event(Event::Start(node))?;
        for value in &list.values {
            let mut item = BytesStart::new("CodeListItem");
            item.push_attribute(("CodedValue", value.as_str()));
            xml.write_event(Event::Start(item))?;
            write_translated_text(&mut xml, "Decode", value)?;
            xml.write_event(Event::End(BytesEnd::new("CodeListItem")))?;
        }
        xml.write_event(Event::End(BytesEnd::new("CodeList")))?;
    }

    // MethodDef for derived variables.
    for entry in entries {
        write_method_defs(&mut xml, entry)?;
    }

    // CommentDef for supplemental qualifier candidates.
    for entry in entries {
        write_comment_defs(&mut xml, entry)?;
    }

    // def:leaf per dataset.
    for entry in entries {
        let dataset = entry.frame.domain_code.to_lowercase();
        let mut leaf = BytesStart::new("def:leaf");
        let leaf_id = format!("LF.{}", entry.frame.domain_code);
        let href = format!("{dataset}.xpt");
        leaf.push_attribute(("ID", leaf_id.as_str()));
        leaf.push_attribute(("xlink:href", href.as_str()));
        xml.write_event(Event::Start(leaf))?;
        write_text_element(&mut xml, "def:title", &entry.frame.label)?;
        xml.write_event(Event::End(BytesEnd::new("def:leaf")))?;
    }

    xml.write_event(Event::End(BytesEnd::new("MetaDataVersion")))?;
    xml.write_event(Event::End(BytesEnd::new("Study")))?;
    xml.write_event(Event::End(BytesEnd::new("ODM")))?;
    Ok(())
}

fn write_item_group<W: std::io::Write>(
    xml: &mut Writer<W>,
    entry: &DefineEntry<'_>,
    reference: &ReferenceStore,
) -> Result<()> {
    let code = &entry.frame.domain_code;
    let domain_spec = reference.get_domain_spec(code).ok();

    let mut group = BytesStart::new("ItemGroupDef");
    let oid = format!("IG.{code}");
    group.push_attribute(("OID", oid.as_str()));
    group.push_attribute(("Name", code.as_str()));
    group.push_attribute(("Repeating", "Yes"));
    group.push_attribute(("Domain", code.as_str()));
    group.push_attribute(("def:Label", entry.frame.label.as_str()));
    if let Some(spec) = domain_spec {
        group.push_attribute(("def:Class", spec.class.as_str()));
        group.push_attribute(("def:Structure", spec.structure_note.as_str()));
    }
    let archive_id = format!("LF.{code}");
    group.push_attribute(("def:ArchiveLocationID", archive_id.as_str()));
    xml.write_event(Event::Start(group))?;

    let mut key_sequence = 1usize;
    let columns: Vec<String> = entry
        .frame
        .data
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();
    for (index, name) in columns.iter().enumerate() {
        let mut item_ref = BytesStart::new("ItemRef");
        let item_oid = format!("IT.{code}.{name}");
        let order = format!("{}", index + 1);
        item_ref.push_attribute(("ItemOID", item_oid.as_str()));
        item_ref.push_attribute(("OrderNumber", order.as_str()));
        let required = domain_spec
            .and_then(|s| s.find_variable(name))
            .map(|v| v.core.is_required())
            .unwrap_or(false);
        item_ref.push_attribute(("Mandatory", if required { "Yes" } else { "No" }));
        let is_key = domain_spec
            .map(|s| s.key_variables.iter().any(|k| k.eq_ignore_ascii_case(name)))
            .unwrap_or(false);
        if is_key {
            let seq = format!("{key_sequence}");
            item_ref.push_attribute(("KeySequence", seq.as_str()));
            key_sequence += 1;
        }
        xml.write_event(Event::Empty(item_ref))?;
    }
    xml.write_event(Event::End(BytesEnd::new("ItemGroupDef")))?;
    Ok(())
}

fn write_item_defs<W: std::io::Write>(
    xml: &mut Writer<W>,
    entry: &DefineEntry<'_>,
    reference: &ReferenceStore,
    code_lists: &mut BTreeMap<String, CodeListSpec>,
) -> Result<()> {
    let code = &entry.frame.domain_code;
    let domain_spec = reference.get_domain_spec(code).ok();

    for column in entry.frame.data.get_columns() {
        let name = column.name().to_string();
        let reference_variable = domain_spec.and_then(|s| s.find_variable(&name));
        let mapping = entry.spec.and_then(|s| s.find_mapping(&name));

        let data_type = reference_variable
            .map(|v| v.data_type)
            .unwrap_or(VariableDataType::Char);
        let mut item = BytesStart::new("ItemDef");
        let oid = format!("IT.{code}.{name}");
        item.push_attribute(("OID", oid.as_str()));
        item.push_attribute(("Name", name.as_str()));
        item.push_attribute((
            "DataType",
            match data_type {
                VariableDataType::Char => "text",
                VariableDataType::Num => "float",
            },
        ));
        if data_type == VariableDataType::Char {
            let length = column_length(column);
            let length_text = format!("{length}");
            item.push_attribute(("Length", length_text.as_str()));
        }
        xml.write_event(Event::Start(item))?;

        let label = mapping
            .map(|m| m.sdtm_label.clone())
            .or_else(|| reference_variable.map(|v| v.label.clone()));
        if let Some(label) = label {
            write_translated_text(xml, "Description", &label)?;
        }

        let codelist_code = mapping
            .and_then(|m| m.codelist_code.clone())
            .or_else(|| reference_variable.and_then(|v| v.codelist_code.clone()));
        if let Some(codelist_code) = codelist_code {
            if let Some(codelist) = reference.lookup_codelist(&codelist_code) {
                let codelist_oid = format!("CL.{}", codelist.code);
                code_lists.entry(codelist_oid.clone()).or_insert_with(|| CodeListSpec {
                    name: codelist.name.clone(),
                    values: codelist
                        .submission_values()
                        .into_iter()
                        .map(str::to_string)
                        .collect(),
                    extensible: codelist.extensible,
                });
                let mut reference_node = BytesStart::new("CodeListRef");
                reference_node.push_attribute(("CodeListOID", codelist_oid.as_str()));
                xml.write_event(Event::Empty(reference_node))?;
            }
        }

        let origin = mapping.map(|m| m.origin).unwrap_or(VariableOrigin::Assigned);
        let mut origin_node = BytesStart::new("def:Origin");
        origin_node.push_attribute((
            "Type",
            match origin {
                VariableOrigin::Crf => "Collected",
                VariableOrigin::Derived => "Derived",
                VariableOrigin::Assigned => "Assigned",
                VariableOrigin::Protocol => "Protocol",
                VariableOrigin::Edt => "eDT",
                VariableOrigin::Predecessor => "Predecessor",
            },
        ));
        xml.write_event(Event::Empty(origin_node))?;

        xml.write_event(Event::End(BytesEnd::new("ItemDef")))?;
    }
    Ok(())
}

fn write_value_lists<W: std::io::Write>(
    xml: &mut Writer<W>,
    entry: &DefineEntry<'_>,
    reference: &ReferenceStore,
) -> Result<()> {
    let code = &entry.frame.domain_code;
    let is_findings = reference
        .get_domain_spec(code)
        .map(|s| s.class == DomainClass::Findings)
        .unwrap_or(false);
    if !is_findings {
        return Ok(());
    }
    let testcd_name = format!("{code}TESTCD");
    let Some(testcd) = find_column(&entry.frame.data, &testcd_name) else {
        return Ok(());
    };
    let test_codes: BTreeSet<String> = (0..testcd.len())
        .filter_map(|idx| astraea_exec::context::string_at(testcd, idx))
        .collect();
    if test_codes.is_empty() {
        return Ok(());
    }

    let mut value_list = BytesStart::new("def:ValueListDef");
    let vl_oid = format!("VL.{code}.{code}ORRES");
    value_list.push_attribute(("OID", vl_oid.as_str()));
    xml.write_event(Event::Start(value_list))?;
    for (index, test_code) in test_codes.iter().enumerate() {
        let mut item_ref = BytesStart::new("ItemRef");
        let item_oid = format!("IT.{code}.{code}ORRES.{test_code}");
        let order = format!("{}", index + 1);
        item_ref.push_attribute(("ItemOID", item_oid.as_str()));
        item_ref.push_attribute(("OrderNumber", order.as_str()));
        item_ref.push_attribute(("Mandatory", "No"));
        xml.write_event(Event::Start(item_ref))?;
        let mut where_ref = BytesStart::new("def:WhereClauseRef");
        let wc_oid = format!("WC.{code}.{test_code}");
        where_ref.push_attribute(("WhereClauseOID", wc_oid.as_str()));
        xml.write_event(Event::Empty(where_ref))?;
        xml.write_event(Event::End(BytesEnd::new("ItemRef")))?;
    }
    xml.write_event(Event::End(BytesEnd::new("def:ValueListDef")))?;

    for test_code in &test_codes {
        let mut where_clause = BytesStart::new("def:WhereClauseDef");
        let wc_oid = format!("WC.{code}.{test_code}");
        where_clause.push_attribute(("OID", wc_oid.as_str()));
        xml.write_event(Event::Start(where_clause))?;
        let mut range = BytesStart::new("RangeCheck");
        range.push_attribute(("Comparator", "EQ"));
        range.push_attribute(("SoftHard", "Soft"));
        let item_oid = format!("IT.{code}.{testcd_name}");
        range.push_attribute(("def:ItemOID", item_oid.as_str()));
        xml.write_event(Event::Start(range))?;
        write_text_element(xml, "CheckValue", test_code)?;
        xml.write_event(Event::End(BytesEnd::new("RangeCheck")))?;
        xml.write_event(Event::End(BytesEnd::new("def:WhereClauseDef")))?;
    }
    Ok(())
}

fn write_method_defs<W: std::io::Write>(
    xml: &mut Writer<W>,
    entry: &DefineEntry<'_>,
) -> Result<()> {
    let Some(spec) = entry.spec else {
        return Ok(());
    };
    for mapping in &spec.variable_mappings {
        if mapping.origin != VariableOrigin::Derived {
            continue;
        }
        let mut method = BytesStart::new("MethodDef");
        let oid = format!("MT.{}.{}", spec.domain, mapping.sdtm_variable);
        let name = format!("Derivation for {}", mapping.sdtm_variable);
        method.push_attribute(("OID", oid.as_str()));
        method.push_attribute(("Name", name.as_str()));
        method.push_attribute(("Type", "Computation"));
        xml.write_event(Event::Start(method))?;
        write_translated_text(xml, "Description", &mapping.mapping_logic)?;
        let mut formal = BytesStart::new("FormalExpression");
        formal.push_attribute(("Context", "Python"));
        xml.write_event(Event::Start(formal))?;
        let expression = mapping
            .derivation_rule
            .as_deref()
            .unwrap_or(&mapping.mapping_logic);
        xml.write_event(Event::Text(BytesText::new(expression)))?;
        xml.write_event(Event::End(BytesEnd::new("FormalExpression")))?;
        xml.write_event(Event::End(BytesEnd::new("MethodDef")))?;
    }
    Ok(())
}

fn write_comment_defs<W: std::io::Write>(
    xml: &mut Writer<W>,
    entry: &DefineEntry<'_>,
) -> Result<()> {
    let Some(spec) = entry.spec else {
        return Ok(());
    };
    for candidate in &spec.suppqual_candidates {
        let mut comment = BytesStart::new("def:CommentDef");
        let oid = format!("COM.{}.{}", spec.domain, candidate.qnam);
        comment.push_attribute(("OID", oid.as_str()));
        xml.write_event(Event::Start(comment))?;
        write_translated_text(
            xml,
            "Description",
            &format!(
                "Non-standard variable {} ({}) carried in SUPP{} from source column {}",
                candidate.qnam, candidate.qlabel, spec.domain, candidate.source_col
            ),
        )?;
        xml.write_event(Event::End(BytesEnd::new("def:CommentDef")))?;
    }
    Ok(())
}

fn column_length(column: &polars::prelude::Column) -> usize {
    (0..column.len())
        .filter_map(|idx| astraea_exec::context::string_at(column, idx))
        .map(|v| v.len())
        .max()
        .unwrap_or(1)
        .clamp(1, 200)
}

fn write_text_element<W: std::io::Write>(
    xml: &mut Writer<W>,
    tag: &str,
    text: &str,
) -> Result<()> {
    xml.write_event(Event::Start(BytesStart::new(tag)))?;
    xml.write_event(Event::Text(BytesText::new(text)))?;
    xml.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

fn write_translated_text<W: std::io::Write>(
    xml: &mut Writer<W>,
    tag: &str,
    text: &str,
) -> Result<()> {
    xml.write_event(Event::Start(BytesStart::new(tag)))?;
    let mut translated = BytesStart::new("TranslatedText");
    translated.push_attribute(("xml:lang", "en"));
    xml.write_event(Event::Start(translated))?;
    xml.write_event(Event::Text(BytesText::new(text)))?;
    xml.write_event(Event::End(BytesEnd::new("TranslatedText")))?;
    xml.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}
