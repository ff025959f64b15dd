use crate::cli::{Cli, OutputFormat};
use anyhow::{Context, Result};
use bookmill::html::{escape_text, image_sources, rewrite_image_sources};
use bookmill::image::{store_images, FsImageStore, ImageMap};
use bookmill::markdown;
use bookmill::metadata;
use bookmill::{
    CancellationToken, ExtractionRequest, ExtractionResult, Linter, Pipeline, ProcessingContext,
};
use std::fs;
use std::path::{Path, PathBuf};

struct ConvertedChapter {
    title: String,
    filename: String,
    content: String,
}

pub fn convert(cli: &Cli) -> Result<()> {
    let file = fs::File::open(&cli.input)
        .with_context(|| format!("Failed to open input file: {}", cli.input.display()))?;
    let file_name = cli
        .input
        .file_name()
        .context("Input file has no name")?
        .to_string_lossy()
        .to_string();
    let request = ExtractionRequest::from_reader(file, file_name)
        .with_context(|| format!("Failed to read input file: {}", cli.input.display()))?;

    let cancel = CancellationToken::new();
    let mut result = bookmill::extract(&request, &cli.extraction_options(), &cancel);

    let language = result
        .metadata
        .language
        .clone()
        .unwrap_or_else(|| cli.language.clone());
    let ctx = ProcessingContext::new(language).with_options(cli.processing_options());
    Pipeline::new().process_result(&mut result, &ctx, &cancel);

    let output_path = resolve_output_path(cli)?;
    let metadata_header = metadata::format_metadata(&result.metadata);

    // Resolve the images output dir:
    // - Folder mode: images go inside the output directory
    // - Single mode: images go next to the output file
    let images_base = if cli.single {
        output_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf()
    } else {
        output_path.clone()
    };
    fs::create_dir_all(&images_base)
        .with_context(|| format!("Failed to create output directory: {}", images_base.display()))?;

    let image_map = if !cli.no_images {
        let store = FsImageStore::new(&images_base);
        store_images(&store, "", &result.images).context("Failed to write images")?
    } else {
        ImageMap::new()
    };

    let converted = convert_chapters(&result, &image_map, cli.format);

    if cli.single {
        write_single_file(&output_path, &metadata_header, &converted, cli.format)?;
    } else {
        write_folder(&output_path, &metadata_header, &converted)?;
    }

    if cli.lint {
        let issues = Linter::new().check_book(&result.units);
        let path = images_base.join("lint.json");
        let json = serde_json::to_string_pretty(&issues).context("Failed to serialise lint report")?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write lint report: {}", path.display()))?;
        log::info!("{} lint issues", issues.len());
    }

    if cli.json {
        let path = images_base.join("result.json");
        let json = serde_json::to_string_pretty(&result).context("Failed to serialise result")?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write result: {}", path.display()))?;
    }

    let chapter_count = converted.len();
    let image_count = image_map.len();
    eprintln!(
        "Converted {} chapters{} to {}",
        chapter_count,
        if image_count > 0 {
            format!(" and {} images", image_count)
        } else {
            String::new()
        },
        output_path.display()
    );
    for warning in &result.diagnostics.warnings {
        eprintln!("warning: {:?}: {}", warning.code, warning.message);
    }

    Ok(())
}

fn resolve_output_path(cli: &Cli) -> Result<PathBuf> {
    if let Some(ref path) = cli.output {
        return Ok(path.clone());
    }

    let stem = cli
        .input
        .file_stem()
        .context("Input file has no name")?
        .to_string_lossy();

    if cli.single {
        Ok(PathBuf::from(format!("{}.{}", stem, cli.format.extension())))
    } else {
        Ok(PathBuf::from(stem.as_ref()))
    }
}

fn convert_chapters(
    result: &ExtractionResult,
    image_map: &ImageMap,
    format: OutputFormat,
) -> Vec<ConvertedChapter> {
    result
        .units
        .iter()
        .enumerate()
        .map(|(i, unit)| {
            for src in image_sources(&unit.html) {
                if !image_map.contains_key(&src) {
                    log::debug!("chapter {} references unknown image {}", i + 1, src);
                }
            }
            let content = match format {
                OutputFormat::Markdown => markdown::html_to_markdown(&unit.html, image_map),
                OutputFormat::Html => {
                    let body = rewrite_image_sources(&unit.html, |src| image_map.get(src).cloned());
                    html_document(&unit.title, &body)
                }
            };
            ConvertedChapter {
                title: unit.title.clone(),
                filename: format!("chapter-{:02}.{}", i + 1, format.extension()),
                content,
            }
        })
        .collect()
}

fn html_document(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\"/>\n<title>{}</title>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        escape_text(title),
        body
    )
}

fn write_single_file(
    output_path: &Path,
    metadata_header: &str,
    chapters: &[ConvertedChapter],
    format: OutputFormat,
) -> Result<()> {
    let mut content = String::new();

    if format == OutputFormat::Markdown {
        content.push_str(metadata_header);
    }

    let separator = match format {
        OutputFormat::Markdown => "\n---\n\n",
        OutputFormat::Html => "\n<hr/>\n\n",
    };
    for (i, chapter) in chapters.iter().enumerate() {
        if i > 0 {
            content.push_str(separator);
        }
        content.push_str(&chapter.content);
        content.push('\n');
    }

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    fs::write(output_path, &content)
        .with_context(|| format!("Failed to write output file: {}", output_path.display()))?;

    Ok(())
}

fn write_folder(output_dir: &Path, metadata_header: &str, chapters: &[ConvertedChapter]) -> Result<()> {
    fs::create_dir_all(output_dir)?;

    for chapter in chapters {
        let path = output_dir.join(&chapter.filename);
        fs::write(&path, &chapter.content)
            .with_context(|| format!("Failed to write chapter: {}", path.display()))?;
    }

    // README.md holds the metadata and table of contents
    let mut readme = String::new();
    readme.push_str(metadata_header);
    readme.push_str("## Table of Contents\n\n");

    for (i, chapter) in chapters.iter().enumerate() {
        readme.push_str(&format!(
            "{}. [{}]({})\n",
            i + 1,
            chapter.title,
            chapter.filename
        ));
    }

    readme.push('\n');

    fs::write(output_dir.join("README.md"), &readme)
        .with_context(|| "Failed to write README.md")?;

    Ok(())
}
