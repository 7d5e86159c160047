use std::io::{self, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use crate::config::Settings;
use crate::error::ConvertError;
use crate::gedcom::builder::TreeBuilder;
use crate::gedcom::writer::GedcomWriter;
use crate::model::{Assembler, Genealogy};
use crate::pages::PageStream;
use crate::parser::{FamilyRecord, PersonRecord, ReportPage};
use crate::report::RunReport;

fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg} {pos}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb
}

/// Parse every page of `path` as `P`, handing each record to `sink` in file order.
async fn read_pages<P, F>(path: &Path, report: &mut RunReport, mut sink: F) -> Result<usize, ConvertError>
where
    P: ReportPage,
    F: FnMut(P) -> Result<(), ConvertError>,
{
    let mut stream = PageStream::open(path).await?;
    let pb = spinner(format!("{} pages", P::KIND));
    let mut count = 0;

    while let Some(page) = stream.next_page().await? {
        if page.lossy {
            report.warn(&format!("{} page {}: invalid UTF-8 replaced", P::KIND, page.number));
        }
        let record = P::parse(&page.text).map_err(|source| ConvertError::Parse {
            kind: P::KIND,
            page: page.number,
            source,
        })?;
        debug!(page = page.number, record = %record.record_key(), "parsed");
        for warning in record.warnings() {
            report.warn(warning);
        }
        report.page(P::KIND);
        sink(record)?;
        count += 1;
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!("{} {} pages read from {}", count, P::KIND, path.display());
    Ok(count)
}

/// Read both reports and assemble them. Family pages go first so that
/// person pages can be checked against them.
pub async fn assemble(settings: &Settings, report: &mut RunReport) -> Result<Genealogy, ConvertError> {
    let mut assembler = Assembler::new();
    read_pages(&settings.family_file, report, |record: FamilyRecord| {
        assembler.add_family_page(&record);
        Ok(())
    })
    .await?;
    info!("{} family records", assembler.family_count());
    read_pages(&settings.person_file, report, |record: PersonRecord| {
        assembler.add_person(record)
    })
    .await?;
    assembler.finish(report)
}

/// The complete GEDCOM text. Nothing is returned unless every record built.
pub fn render(genealogy: &Genealogy, settings: &Settings, now: DateTime<Utc>) -> Result<String, ConvertError> {
    let builder = TreeBuilder::new(&genealogy.citations, settings.format);
    let writer = GedcomWriter::new(settings.format, settings.max_line_length);
    let submitter = settings.submitter.as_ref();

    let mut records = vec![builder.header(&settings.charset, submitter, now)];
    records.extend(submitter.map(|submitter| builder.submitter(submitter)));
    for person in &genealogy.individuals {
        records.push(builder.individual(person)?);
    }
    records.extend(genealogy.families.iter().map(|family| builder.family(family)));
    records.extend(genealogy.citations.get_all_records());
    records.push(builder.trailer());
    Ok(writer.render_all(records))
}

pub async fn run(settings: &Settings, report: &mut RunReport) -> Result<String, ConvertError> {
    let genealogy = assemble(settings, report).await?;
    let text = render(&genealogy, settings, Utc::now())?;
    info!(
        individuals = genealogy.individuals.len(),
        families = genealogy.families.len(),
        sources = genealogy.citations.len(),
        "GEDCOM built"
    );
    Ok(text)
}

/// Print each page's properties as one JSON object per line.
pub async fn dump_pages<P: ReportPage>(
    path: &Path,
    out: &mut impl Write,
    report: &mut RunReport,
) -> Result<usize, ConvertError> {
    read_pages(path, report, |record: P| {
        serde_json::to_writer(&mut *out, record.properties()).map_err(io::Error::from)?;
        writeln!(out)?;
        Ok(())
    })
    .await
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::TimeZone;

    use super::*;
    use crate::config::{OutputFormat, Submitter};

    fn fixture_settings() -> Settings {
        Settings {
            person_file: PathBuf::from("tests/fixtures/person.doc"),
            family_file: PathBuf::from("tests/fixtures/family.doc"),
            ..Settings::default()
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 7, 14, 5, 9).unwrap()
    }

    async fn convert(settings: &Settings) -> (String, RunReport) {
        let mut report = RunReport::new();
        let genealogy = assemble(settings, &mut report).await.unwrap();
        let text = render(&genealogy, settings, fixed_now()).unwrap();
        (text, report)
    }

    #[tokio::test]
    async fn fixture_reports_convert() {
        let (text, report) = convert(&fixture_settings()).await;

        assert!(text.starts_with(
            "0 HEAD\n1 CHAR UTF-8\n1 SOUR {FamilyEdge}\n2 NAME The Family Edge Plus\n2 VERS 2.5b\n\
             1 GEDC\n2 VERS 5.5.1\n2 FORM LINEAGE-LINKED\n1 DATE 07 MAR 2024\n2 TIME 14:05:09\n0 @P1@ INDI\n"
        ));
        assert!(text.ends_with("0 TRLR\n"));
        assert_eq!(text.matches(" INDI\n").count(), 5);
        assert_eq!(text.matches(" FAM\n").count(), 2);
        assert_eq!(text.matches(" SOUR\n").count(), 6);
        // blank child row and uncertain child row
        assert_eq!(report.warnings(), 2);

        for line in text.lines() {
            assert!(line.chars().count() <= 80, "{line:?} is too long");
        }
    }

    #[tokio::test]
    async fn person_details() {
        let (text, _) = convert(&fixture_settings()).await;

        assert!(text.contains(
            "0 @P1@ INDI\n1 NAME John Henry /Smith/\n2 SOUR @S1@\n1 SEX M\n\
             1 BIRT\n2 DATE 12 JAN 1820\n2 PLAC Boston, Massachusetts, USA\n3 SOUR @S2@\n2 SOUR @S2@\n\
             1 DEAT\n2 DATE ABT 1880\n2 PLAC Concord, Massachusetts, USA\n2 SOUR @S3@\n\
             1 BURI\n2 DATE 1880\n2 PLAC Old Hill Burying Ground, Concord, Massachusetts, USA\n\
             2 NOTE Gravestone: Here lies John\n1 OCCU Farmer\n1 NOTE "
        ));
        assert!(text.contains("2 CONC "));
        assert!(text.contains("1 FAMS @F1-2@\n"));
        assert!(text.contains("1 NAME Thomas \"Tom\" /Jones/\n1 SEX M\n1 BIRT\n2 DATE BEF 1800\n"));
        assert!(text.contains("1 FAMS @F5-0@\n"));
    }

    #[tokio::test]
    async fn parentage_and_citations() {
        let (text, _) = convert(&fixture_settings()).await;

        // Mary's row in her father's family is marked uncertain
        assert!(text.contains("0 @P2@ INDI\n1 NAME Mary /Jones/\n1 SEX F\n"));
        assert!(text.contains("1 FAMC @F5-0@\n2 STAT challenged\n1 SOUR @S4@\n2 NOTE Father\n"));

        assert!(text.contains(
            "1 BIRT\n2 DATE ABT 5 MAR 1846/47\n2 PLAC Concord, Massachusetts, USA\n\
             1 WILL\n2 DATE 10 MAY 1900\n2 PLAC Concord, Massachusetts, USA\n\
             1 PROB\n2 DATE 2 JAN 1901\n2 PLAC Concord, Massachusetts, USA\n"
        ));
        assert!(text.contains("1 FAMC @F1-2@\n1 SOUR @S1@\n2 NOTE Parents\n1 SOUR @S5@\n1 SOUR @S6@\n"));

        assert!(text.contains(
            "1 FAMC @F1-2@\n1 ADOP\n2 FAMC @F5-0@\n2 NOTE adopted, see notes\n\
             1 FAMC @F5-0@\n2 PEDI adopted\n2 NOTE adopted, see notes\n"
        ));
    }

    #[tokio::test]
    async fn family_and_source_records() {
        let (text, _) = convert(&fixture_settings()).await;
        assert!(text.contains(
            "0 @F1-2@ FAM\n1 HUSB @P1@\n1 WIFE @P2@\n1 MARR\n2 DATE 3 JUN 1845\n1 CHIL @P3@\n1 CHIL @P4@\n"
        ));
        assert!(text.contains("0 @F5-0@ FAM\n1 HUSB @P5@\n1 CHIL @P2@\n"));
        assert!(text.contains("0 @S1@ SOUR\n1 TITL Smith Family Bible\n"));
        assert!(text.contains("0 @S6@ SOUR\n1 TITL 1860 US Census\n0 TRLR\n"));
    }

    #[tokio::test]
    async fn ancestry_flavour_with_submitter() {
        let settings = Settings {
            format: OutputFormat::Ancestry,
            submitter: Some(Submitter {
                name: Some("Jane Researcher".into()),
                address: Some("12 Elm Street\nConcord, MA".into()),
                ..Submitter::default()
            }),
            ..fixture_settings()
        };
        let (text, _) = convert(&settings).await;
        assert!(text.contains("1 SUBM @SUBM1@\n0 @SUBM1@ SUBM\n1 NAME Jane Researcher\n1 ADDR 12 Elm Street\n2 CONT Concord, MA\n"));
        assert!(text.contains("2 DATE abt 1880\n"));
        assert!(text.contains("1 BURI Gravestone: Here lies John\n2 DATE 1880\n"));
    }

    #[tokio::test]
    async fn missing_family_aborts_run() {
        let dir = std::env::temp_dir().join(format!("edge2ged-missing-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let person_file = dir.join("person.doc");
        std::fs::write(
            &person_file,
            "PERSON REPORT\n=====\nFULL NAME: Ruth WEST (#20)\nFATHER: Carl WEST (#9)\n",
        )
        .unwrap();
        let settings = Settings {
            person_file,
            ..fixture_settings()
        };

        let mut report = RunReport::new();
        let err = run(&settings, &mut report).await.unwrap_err();
        assert!(matches!(err, ConvertError::MissingFamily { person: 20, .. }));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn parse_error_names_the_page() {
        let dir = std::env::temp_dir().join(format!("edge2ged-parse-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let family_file = dir.join("family.doc");
        std::fs::write(&family_file, "\x0cFAMILY GROUP REPORT\n=====\nnot a family\n").unwrap();
        let settings = Settings {
            family_file,
            ..fixture_settings()
        };

        let mut report = RunReport::new();
        let err = run(&settings, &mut report).await.unwrap_err();
        assert!(matches!(
            err,
            ConvertError::Parse { page: 2, source: crate::error::ParseError::MissingParentBlock(_), .. }
        ));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn dumps_properties_as_json_lines() {
        let mut out = Vec::new();
        let mut report = RunReport::new();
        let count = dump_pages::<FamilyRecord>(Path::new("tests/fixtures/family.doc"), &mut out, &mut report)
            .await
            .unwrap();
        assert_eq!(count, 3);
        let text = String::from_utf8(out).unwrap();
        let first: serde_json::Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
        assert_eq!(first["HUSBAND"], 1);
        assert_eq!(first["MARR"][0]["kind"], "Marriage");
        assert_eq!(first["MARR"][0]["date"], "3 JUN 1845");
        assert_eq!(first["CHILDREN"][0]["id"], 3);
    }
}
