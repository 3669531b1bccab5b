#![allow(clippy::result_large_err)]

//! Named pipelines shipped with the compiler.

use crate::core::error::AppError;
use crate::core::pipeline::schema::PipelineDocument;
use crate::core::types::ErrorCategory;

/// A prebuilt pipeline description addressed by name.
#[derive(Debug, Clone, Copy)]
pub struct Recipe {
    pub name: &'static str,
    pub description: &'static str,
    source: &'static str,
}

impl Recipe {
    /// Parse and structurally validate the recipe's pipeline.
    pub fn document(&self) -> Result<PipelineDocument, AppError> {
        let document = PipelineDocument::parse_str(self.source)
            .map_err(|err| err.with_context(format!("recipe {}", self.name)))?;
        document.validate()?;
        Ok(document)
    }
}

const RECIPES: &[Recipe] = &[
    Recipe {
        name: "innuca",
        description: "Read check, trimming, SPAdes assembly, Pilon polishing and a report",
        source: r#"
name: innuca
inputs:
  - name: fastq
    source: file_pairs
    default: "fastq/*_{1,2}.*"
stages:
  - id: qc
    kind: reads:integrity_coverage
  - id: trim
    kind: trim:trimmomatic
    inputs:
      - role: reads
        from: qc.reads
  - id: asm
    kind: assembly:spades
    inputs:
      - role: reads
        from: trim.reads
  - id: pol
    kind: polish:pilon
    inputs:
      - role: contigs
        from: asm.contigs
      - role: reads
        from: trim.reads
  - id: rep
    kind: report
    inputs:
      - role: contigs
        from: pol.contigs
"#,
    },
    Recipe {
        name: "skesa",
        description: "Read check, trimming and SKESA assembly, annotated and reported",
        source: r#"
name: skesa
inputs:
  - name: fastq
    source: file_pairs
    default: "fastq/*_{1,2}.*"
stages:
  - id: qc
    kind: reads:integrity_coverage
  - id: trim
    kind: trim:trimmomatic
    inputs:
      - role: reads
        from: qc.reads
  - id: asm
    kind: assembly:skesa
    inputs:
      - role: reads
        from: trim.reads
  - id: amr
    kind: annotation:abricate
    inputs:
      - role: contigs
        from: asm.contigs
  - id: rep
    kind: report
    inputs:
      - role: contigs
        from: asm.contigs
"#,
    },
    Recipe {
        name: "compare_assemblers",
        description: "Trimmed reads assembled by SPAdes and SKESA, both reported together",
        source: r#"
name: compare_assemblers
inputs:
  - name: fastq
    source: file_pairs
    default: "fastq/*_{1,2}.*"
stages:
  - id: qc
    kind: reads:integrity_coverage
  - id: trim
    kind: trim:trimmomatic
    inputs:
      - role: reads
        from: qc.reads
  - id: spades
    kind: assembly:spades
    inputs:
      - role: reads
        from: trim.reads
  - id: skesa
    kind: assembly:skesa
    inputs:
      - role: reads
        from: trim.reads
  - id: rep
    kind: report
    inputs:
      - role: contigs
        from: [spades.contigs, skesa.contigs]
"#,
    },
];

pub fn recipes() -> &'static [Recipe] {
    RECIPES
}

/// Look a recipe up by name.
pub fn find(name: &str) -> Result<&'static Recipe, AppError> {
    RECIPES
        .iter()
        .find(|recipe| recipe.name == name)
        .ok_or_else(|| {
            let known: Vec<&str> = RECIPES.iter().map(|recipe| recipe.name).collect();
            AppError::new(
                ErrorCategory::ValidationError,
                format!("unknown recipe '{}'", name),
            )
            .with_code("PW-RECIPE-001")
            .with_suggestion(format!("available recipes: {}", known.join(", ")))
        })
}
