use pipewright::core::error::{AppError, DefaultErrorReporter, ErrorReporter};
use pipewright::core::pipeline::CompileError;
use pipewright::core::types::{ErrorCategory, ErrorSeverity};

#[test]
fn test_error_creation_all_categories() {
    let categories = vec![
        ErrorCategory::ValidationError,
        ErrorCategory::TemplateError,
        ErrorCategory::ConfigError,
        ErrorCategory::SerializationError,
        ErrorCategory::IoError,
        ErrorCategory::InternalError,
        ErrorCategory::Unknown,
    ];

    for category in categories {
        let error = AppError::new(category, "test message");
        assert_eq!(error.category, category);
        assert_eq!(error.message, "test message");
        assert!(error.context.is_empty());
        assert!(error.recovery_suggestions.is_empty());
        assert!(error.occurred_at <= chrono::Utc::now());
        assert!(error.source.is_none());
    }
}

#[test]
fn test_error_severity_mapping() {
    assert_eq!(
        AppError::new(ErrorCategory::ConfigError, "x").severity(),
        ErrorSeverity::Error
    );
    assert_eq!(
        AppError::new(ErrorCategory::Unknown, "x").severity(),
        ErrorSeverity::Info
    );
}

#[test]
fn test_error_display_includes_code_and_category() {
    let error = AppError::new(ErrorCategory::ConfigError, "bad hooks").with_code("PW-CFG-003");
    assert_eq!(error.to_string(), "[PW-CFG-003] ConfigError: bad hooks");
}

#[test]
fn test_error_builders_accumulate() {
    let mut error = AppError::new(ErrorCategory::IoError, "cannot write")
        .with_context("out/assembly.nf")
        .with_suggestion("create the directory first");
    error.add_context("stage", "A");

    assert_eq!(error.context.get("context").unwrap(), "out/assembly.nf");
    assert_eq!(error.context.get("stage").unwrap(), "A");
    assert_eq!(error.recovery_suggestions, vec!["create the directory first"]);
    assert!(error.to_string().contains("Context:"));
}

#[test]
fn test_with_source_chains_cause() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    let error = AppError::with_source(ErrorCategory::IoError, "read failed", Box::new(io));
    assert!(error.to_string().contains("Caused by: gone"));
}

#[test]
fn test_compile_error_conversion_keeps_code_and_stages() {
    let error = AppError::from(CompileError::CyclicPipeline {
        stages: vec!["A".to_string(), "B".to_string()],
    });
    assert_eq!(error.code, "PW-GRAPH-001");
    assert_eq!(error.category, ErrorCategory::ValidationError);
    assert_eq!(error.context.get("stages").unwrap(), "A,B");
    assert!(!error.recovery_suggestions.is_empty());
}

#[test]
fn test_template_errors_map_to_template_category() {
    let error = AppError::from(CompileError::UnknownStageKind {
        stage: "A".to_string(),
        kind: "assembly:velvet".to_string(),
    });
    assert_eq!(error.code, "PW-TPL-001");
    assert_eq!(error.category, ErrorCategory::TemplateError);
}

#[test]
fn test_compile_error_codes_are_stable() {
    let cases = vec![
        (
            CompileError::DuplicateStageId {
                stage: "A".to_string(),
            },
            "PW-GRAPH-002",
        ),
        (
            CompileError::InvalidStage {
                stage: "A".to_string(),
                reason: "bad".to_string(),
            },
            "PW-GRAPH-003",
        ),
        (
            CompileError::DuplicateOutput {
                stage: "A".to_string(),
                role: "assembly".to_string(),
            },
            "PW-CHAN-001",
        ),
        (
            CompileError::UnresolvedInput {
                stage: "B".to_string(),
                role: "contigs".to_string(),
                reference: "A.contigs".to_string(),
            },
            "PW-CHAN-002",
        ),
        (
            CompileError::DanglingChannel {
                channel: "A_contigs".to_string(),
                stage: "B".to_string(),
                role: "contigs".to_string(),
            },
            "PW-CHAN-003",
        ),
        (
            CompileError::ChannelNameCollision {
                channel: "A_b_c".to_string(),
                first: "A_b.c".to_string(),
                second: "A.b_c".to_string(),
            },
            "PW-CHAN-004",
        ),
        (
            CompileError::TemplateBinding {
                stage: "A".to_string(),
                kind: "assembly:spades".to_string(),
                placeholder: "opt.kmers".to_string(),
                reason: "expected text".to_string(),
            },
            "PW-TPL-002",
        ),
    ];
    for (error, code) in cases {
        assert_eq!(error.code(), code, "{}", error);
    }
}

#[test]
fn test_anyhow_conversion() {
    let error = AppError::from(anyhow::anyhow!("boom"));
    assert_eq!(error.category, ErrorCategory::InternalError);
    assert_eq!(error.message, "boom");
    assert!(error.source.is_some());
}

#[test]
fn test_default_reporter_does_not_panic() {
    let reporter = DefaultErrorReporter::new();
    let error = AppError::new(ErrorCategory::ValidationError, "bad pipeline")
        .with_suggestion("run pipewright check");
    reporter.report_error(&error);
    reporter.report_warning("careful", Some("stage A".to_string()));
    reporter.report_info("done");
}
