use pagecraft_core::GenerationContext;

pub struct SectionPrompts;

impl SectionPrompts {
    pub fn system() -> &'static str {
        r#"You are a senior web designer building a marketing landing page one section at a time.

Respond with a single self-contained HTML fragment for the requested section:
- One root `<section>` element, no `<html>`, `<head>` or `<body>`
- Semantic markup with Tailwind CSS utility classes for styling
- No scripts, no external assets other than those named in the configuration
- No commentary before or after the markup"#
    }

    pub fn generate(section_name: &str, context: &GenerationContext) -> String {
        format!(
            r#"Create the **{section}** section for the landing page below.

## Project
**Name:** {name}
**Description:** {description}

## Section configuration
{config}

Return only the HTML for this section."#,
            section = section_name,
            name = context.project_name,
            description = Self::description(context),
            config = Self::config_block(section_name, context),
        )
    }

    pub fn regenerate(
        section_name: &str,
        context: &GenerationContext,
        feedback: &str,
        previous_content: &str,
    ) -> String {
        format!(
            r#"Revise the **{section}** section of the landing page below based on the reviewer's feedback.

## Project
**Name:** {name}
**Description:** {description}

## Section configuration
{config}

## Current version
```html
{previous}
```

## Feedback
{feedback}

Apply the feedback and keep everything it does not mention. Return only the revised HTML for this section."#,
            section = section_name,
            name = context.project_name,
            description = Self::description(context),
            config = Self::config_block(section_name, context),
            previous = previous_content.trim(),
            feedback = feedback.trim(),
        )
    }

    fn description(context: &GenerationContext) -> &str {
        if context.project_description.trim().is_empty() {
            "(none provided)"
        } else {
            context.project_description.trim()
        }
    }

    fn config_block(section_name: &str, context: &GenerationContext) -> String {
        match context.config_for(section_name) {
            Some(config) => {
                let pretty =
                    serde_json::to_string_pretty(config).unwrap_or_else(|_| config.to_string());
                format!("```json\n{}\n```", pretty)
            }
            None => "No specific configuration; use sensible defaults for this section.".to_string(),
        }
    }
}
