// Protobuf messages stored in .demo files.
//
// Declared by hand with prost derives; tags match mlagents_envs/communicator_objects.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum SpaceTypeProto {
    Discrete = 0,
    Continuous = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum CompressionTypeProto {
    None = 0,
    Png = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ObservationTypeProto {
    Default = 0,
    GoalSignal = 1,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DemonstrationMetaProto {
    #[prost(int32, tag = "1")]
    pub api_version: i32,
    #[prost(string, tag = "2")]
    pub demonstration_name: ::prost::alloc::string::String,
    #[prost(int32, tag = "3")]
    pub number_steps: i32,
    #[prost(int32, tag = "4")]
    pub number_episodes: i32,
    #[prost(float, tag = "5")]
    pub mean_reward: f32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ActionSpecProto {
    #[prost(int32, tag = "1")]
    pub num_continuous_actions: i32,
    #[prost(int32, tag = "2")]
    pub num_discrete_actions: i32,
    #[prost(int32, repeated, tag = "3")]
    pub discrete_branch_sizes: ::prost::alloc::vec::Vec<i32>,
    #[prost(string, repeated, tag = "4")]
    pub action_descriptions: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BrainParametersProto {
    #[prost(int32, repeated, tag = "3")]
    pub vector_action_size_deprecated: ::prost::alloc::vec::Vec<i32>,
    #[prost(string, repeated, tag = "5")]
    pub vector_action_descriptions_deprecated:
        ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(enumeration = "SpaceTypeProto", tag = "6")]
    pub vector_action_space_type_deprecated: i32,
    #[prost(string, tag = "7")]
    pub brain_name: ::prost::alloc::string::String,
    #[prost(bool, tag = "8")]
    pub is_training: bool,
    #[prost(message, optional, tag = "9")]
    pub action_spec: ::core::option::Option<ActionSpecProto>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ObservationProto {
    #[prost(int32, repeated, tag = "1")]
    pub shape: ::prost::alloc::vec::Vec<i32>,
    #[prost(enumeration = "CompressionTypeProto", tag = "2")]
    pub compression_type: i32,
    #[prost(int32, repeated, tag = "5")]
    pub compressed_channel_mapping: ::prost::alloc::vec::Vec<i32>,
    #[prost(int32, repeated, tag = "6")]
    pub dimension_properties: ::prost::alloc::vec::Vec<i32>,
    #[prost(enumeration = "ObservationTypeProto", tag = "7")]
    pub observation_type: i32,
    #[prost(string, tag = "8")]
    pub name: ::prost::alloc::string::String,
    #[prost(oneof = "observation_proto::ObservationData", tags = "3, 4")]
    pub observation_data: ::core::option::Option<observation_proto::ObservationData>,
}

pub mod observation_proto {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct FloatData {
        #[prost(float, repeated, tag = "1")]
        pub data: ::prost::alloc::vec::Vec<f32>,
    }

    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum ObservationData {
        #[prost(bytes, tag = "3")]
        CompressedData(::prost::alloc::vec::Vec<u8>),
        #[prost(message, tag = "4")]
        FloatData(FloatData),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AgentInfoProto {
    #[prost(float, tag = "7")]
    pub reward: f32,
    #[prost(bool, tag = "8")]
    pub done: bool,
    #[prost(bool, tag = "9")]
    pub max_step_reached: bool,
    #[prost(int32, tag = "10")]
    pub id: i32,
    #[prost(bool, repeated, tag = "11")]
    pub action_mask: ::prost::alloc::vec::Vec<bool>,
    #[prost(message, repeated, tag = "13")]
    pub observations: ::prost::alloc::vec::Vec<ObservationProto>,
    #[prost(int32, tag = "14")]
    pub group_id: i32,
    #[prost(float, tag = "15")]
    pub group_reward: f32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AgentActionProto {
    #[prost(float, repeated, tag = "1")]
    pub vector_actions_deprecated: ::prost::alloc::vec::Vec<f32>,
    #[prost(float, tag = "4")]
    pub value: f32,
    #[prost(float, repeated, tag = "6")]
    pub continuous_actions: ::prost::alloc::vec::Vec<f32>,
    #[prost(int32, repeated, tag = "7")]
    pub discrete_actions: ::prost::alloc::vec::Vec<i32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AgentInfoActionPairProto {
    #[prost(message, optional, tag = "1")]
    pub agent_info: ::core::option::Option<AgentInfoProto>,
    #[prost(message, optional, tag = "2")]
    pub action_info: ::core::option::Option<AgentActionProto>,
}

impl ObservationProto {
    /// An uncompressed observation holding `data`.
    pub fn from_floats(name: impl Into<String>, shape: Vec<i32>, data: Vec<f32>) -> Self {
        Self {
            shape,
            name: name.into(),
            observation_data: Some(observation_proto::ObservationData::FloatData(
                observation_proto::FloatData { data },
            )),
            ..Default::default()
        }
    }
}
