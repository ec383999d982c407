use crate::llm;
use crate::{Error, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestAssistantMessageContent,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequestArgs, ResponseFormat,
        ResponseFormatJsonSchema, Role,
    },
};
use async_trait::async_trait;

pub struct OpenAI {
    model: String,
    client: Client<OpenAIConfig>,
}

impl OpenAI {
    /// Reads the api key from OPENAI_API_KEY.
    pub fn new(model: String) -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self {
            model,
            client: Client::new(),
        })
    }
}

impl TryFrom<&llm::Message> for ChatCompletionRequestMessage {
    type Error = Error;

    fn try_from(msg: &llm::Message) -> Result<Self> {
        match msg {
            llm::Message::User(msg) => Ok(ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessage {
                    content: ChatCompletionRequestUserMessageContent::Text(msg.clone()),
                    name: None,
                },
            )),
            llm::Message::System(msg) => Ok(ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessage {
                    content: ChatCompletionRequestSystemMessageContent::Text(msg.clone()),
                    name: None,
                },
            )),
            llm::Message::Assistant(msg) => Ok(ChatCompletionRequestMessage::Assistant(
                ChatCompletionRequestAssistantMessageArgs::default()
                    .content(ChatCompletionRequestAssistantMessageContent::Text(
                        msg.clone(),
                    ))
                    .build()?,
            )),
        }
    }
}

impl From<&llm::OutputSchema> for ResponseFormat {
    fn from(schema: &llm::OutputSchema) -> Self {
        ResponseFormat::JsonSchema {
            json_schema: ResponseFormatJsonSchema {
                name: schema.name.clone(),
                description: Some(schema.desc.clone()),
                schema: Some(schema.schema.clone()),
                strict: None,
            },
        }
    }
}

#[async_trait]
impl llm::LLM for OpenAI {
    async fn completion<'a>(
        &self,
        request: llm::CompletionRequest<'a>,
    ) -> Result<llm::CompletionResponse> {
        let mut completion = CreateChatCompletionRequestArgs::default();
        completion.model(&self.model).messages(
            request
                .messages
                .into_iter()
                .map(ChatCompletionRequestMessage::try_from)
                .collect::<Result<Vec<_>>>()?,
        );

        if let Some(schema) = request.schema {
            completion.response_format(ResponseFormat::from(schema));
        }

        if let Some(temperature) = request.temperature {
            completion.temperature(temperature);
        }

        let completion = completion.build()?;

        let res = self.client.chat().create(completion).await?;

        if res.choices.is_empty() {
            return Err(Error::LLMResponseError("choices is empty".to_string()));
        }

        if res.choices[0].message.role != Role::Assistant {
            return Err(Error::LLMResponseError(
                "expected role to be assistant".to_string(),
            ));
        }

        let content = res.choices[0]
            .message
            .content
            .as_ref()
            .ok_or(Error::LLMResponseError("content is empty".to_string()))?;

        Ok(llm::CompletionResponse {
            content: content.clone(),
        })
    }
}
