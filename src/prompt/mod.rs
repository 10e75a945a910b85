//! System instructions and user templates for the three requests the loop sends.

use crate::llm::{ChatMessage, ContentPart, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultRole {
    /// Plain-text question to Plotly script.
    Visualize,
    /// Question plus image (and its description) to Plotly script.
    VisualizeWithImage,
    /// Preliminary summary of an input image.
    DescribeImage,
}

pub fn default_role_text(role: DefaultRole) -> &'static str {
    match role {
        DefaultRole::Visualize => "You are an AI tutor specializing in computer graphics. Given the following question, generate a Python script using Plotly that visualizes the scenario described and save it as html. The code should be self-contained and executable, including all necessary imports and definitions.",
        DefaultRole::VisualizeWithImage => "You are an AI assistant specializing in computer graphics. Given the following question, image description, and image, generate a complete, self-contained Python script using Plotly that visualizes the scenario described. The code should include all necessary imports and definitions and save the figure as an HTML file. Please output only the code inside a standalone Python code block, without additional explanations.",
        DefaultRole::DescribeImage => "You are an AI assistant specializing in computer graphics. Given the following image, provide a detailed description of the main objects, shapes, and visual effects present in the image. Focus on identifying key elements like the type of objects, their positions, their interactions (e.g., cutting, overlapping), and any effects such as shading, lighting, or reflections. The description should be concise, informative, and focus on elements that are most relevant for recreating the scene programmatically.",
    }
}

const DESCRIBE_IMAGE_TEMPLATE: &str = "Provide a detailed and concise description of the main objects, shapes, interactions, and visual effects in the image, focusing on details relevant for generating a graphical representation.";

/// Skeleton the model is asked to fill in. The script must write
/// `temp_<timestamp>.html` into its working directory.
pub const CODE_SKELETON: &str = "```python
import numpy as np
import plotly.graph_objects as go
import time

fig.write_html(f'temp_{time.time()}.html')
```";

pub fn visualize_request(question: &str) -> Vec<ChatMessage> {
    let user = format!(
        "\n##Question:\n{question}\n\n##Output:\n\nFill below Python code in a standalone code block.\n{CODE_SKELETON}\n\n"
    );
    vec![
        ChatMessage::new(Role::System, default_role_text(DefaultRole::Visualize)),
        ChatMessage::new(Role::User, user),
    ]
}

pub fn describe_image_request(image_url: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::new(Role::System, default_role_text(DefaultRole::DescribeImage)),
        ChatMessage::multimodal(
            Role::User,
            vec![
                ContentPart::text(DESCRIBE_IMAGE_TEMPLATE),
                ContentPart::image_url(image_url),
            ],
        ),
    ]
}

pub fn visualize_with_image_request(
    question: &str,
    image_description: &str,
    image_url: &str,
) -> Vec<ChatMessage> {
    let text = format!(
        "\n## Question:\n{question}\n\n## Image Description:\n{image_description}\n\n## Output:\nProvide the Python code in a standalone code block.\n\n{CODE_SKELETON}\n"
    );
    vec![
        ChatMessage::new(Role::System, default_role_text(DefaultRole::VisualizeWithImage)),
        ChatMessage::multimodal(
            Role::User,
            vec![ContentPart::text(text), ContentPart::image_url(image_url)],
        ),
    ]
}
