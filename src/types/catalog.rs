//! Known model identifiers for vendors that publish fixed catalogues.
//!
//! Any string is accepted by [`crate::RequestBuilder::model`]; these enums
//! only spare callers from typing identifiers by hand.

use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Models served by Together AI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr)]
pub enum TogetherModel {
    #[strum(to_string = "moonshotai/Kimi-K2-Instruct-0905")]
    KimiK2Instruct0905,
    #[strum(to_string = "Qwen/Qwen3-Next-80B-A3B-Instruct")]
    Qwen3Next80bA3bInstruct,
    #[strum(to_string = "meta-llama/Llama-4-Maverick-17B-128E-Instruct-FP8")]
    Llama4Maverick17b128eInstructFp8,
    #[strum(to_string = "meta-llama/Llama-3.3-70B-Instruct-Turbo")]
    Llama33_70bInstructTurbo,
}

impl TogetherModel {
    /// Vendor identifier of the model.
    pub fn as_str(&self) -> &'static str {
        (*self).into()
    }
}

impl From<TogetherModel> for String {
    fn from(model: TogetherModel) -> Self {
        model.to_string()
    }
}

/// Models served by Novita AI's OpenAI-compatible endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr)]
pub enum NovitaModel {
    #[strum(to_string = "deepseek/deepseek-v3-0324")]
    DeepseekV3_0324,
    #[strum(to_string = "deepseek/deepseek-r1-0528")]
    DeepseekR1_0528,
    #[strum(to_string = "deepseek/deepseek-v3-turbo")]
    DeepseekV3Turbo,
    #[strum(to_string = "deepseek/deepseek-r1-turbo")]
    DeepseekR1Turbo,
    #[strum(to_string = "deepseek/deepseek-prover-v2-671b")]
    DeepseekProverV2_671b,
    #[strum(to_string = "deepseek/deepseek-r1-distill-llama-70b")]
    DeepseekR1DistillLlama70b,
    #[strum(to_string = "deepseek/deepseek-v3.2")]
    DeepseekV3_2,
    #[strum(to_string = "baidu/ernie-4.5-300b-a47b-paddle")]
    Ernie4_5_300bA47bPaddle,
    #[strum(to_string = "qwen/qwen2.5-7b-instruct")]
    Qwen2_5_7bInstruct,
    #[strum(to_string = "qwen/qwen3-32b-fp8")]
    Qwen3_32bFp8,
    #[strum(to_string = "qwen/qwen3-235b-a22b-fp8")]
    Qwen3_235bA22bFp8,
    #[strum(to_string = "qwen/qwen3-max")]
    Qwen3Max,
    #[strum(to_string = "google/gemma-3-27b-it")]
    Gemma3_27bIt,
    #[strum(to_string = "meta-llama/llama-3.1-8b-instruct")]
    Llama3_1_8bInstruct,
    #[strum(to_string = "meta-llama/llama-3.3-70b-instruct")]
    Llama3_3_70bInstruct,
    #[strum(to_string = "meta-llama/llama-4-scout-17b-16e-instruct")]
    Llama4Scout17b16eInstruct,
    #[strum(to_string = "minimax/minimax-m2.1")]
    MinimaxM2_1,
    #[strum(to_string = "zai-org/glm-4.6")]
    Glm4_6,
    #[strum(to_string = "mistralai/mistral-nemo")]
    MistralNemo,
    #[strum(to_string = "gryphe/mythomax-l2-13b")]
    MythomaxL2_13b,
    #[strum(to_string = "microsoft/wizardlm-2-8x22b")]
    Wizardlm2_8x22b,
    #[strum(to_string = "moonshotai/kimi-k2-instruct")]
    KimiK2Instruct,
    #[strum(to_string = "moonshotai/kimi-k2-thinking")]
    KimiK2Thinking,
}

impl NovitaModel {
    /// Vendor identifier of the model.
    pub fn as_str(&self) -> &'static str {
        (*self).into()
    }
}

impl From<NovitaModel> for String {
    fn from(model: NovitaModel) -> Self {
        model.to_string()
    }
}
